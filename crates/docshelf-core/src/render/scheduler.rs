//! Render scheduler
//!
//! Drives the page renderer for the one document currently on screen.
//!
//! `view_document` bumps the generation, cancels outstanding page tasks,
//! (re)opens the renderer and submits one task per page to a bounded
//! pool. Tasks wait for a semaphore permit, then rasterize on tokio's
//! blocking threads. Each finished page is handed to the `UiDispatcher`
//! and applied through the `GenerationGate`, which drops results that
//! belong to an older generation.
//!
//! ## Stale results
//!
//! Bumping the generation waits for any delivery in progress, so once
//! `view_document` or `clear` returns, no callback for an older
//! generation runs. A page callback may itself switch documents or clear
//! the view. That bump skips the wait, since the thread is already inside
//! a delivery; deliveries running on other threads at that moment
//! (`DirectDispatcher`) can still finish.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::dispatch::UiDispatcher;
use super::error::RenderResult;
use super::page::{PageImage, RenderSettings};
use super::renderer::PageRenderer;
use super::source::DocumentLoader;

thread_local! {
    /// Gates this thread is delivering through, innermost last
    static DELIVERING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks the gate as delivering on this thread until dropped
struct DeliveryScope(usize);

impl DeliveryScope {
    fn enter(key: usize) -> Self {
        DELIVERING.with(|d| d.borrow_mut().push(key));
        Self(key)
    }
}

impl Drop for DeliveryScope {
    fn drop(&mut self) {
        DELIVERING.with(|d| {
            let mut keys = d.borrow_mut();
            if let Some(pos) = keys.iter().rposition(|k| *k == self.0) {
                keys.remove(pos);
            }
        });
    }
}

/// Generation counter plus the lock results are applied under
#[derive(Debug, Default)]
pub struct GenerationGate {
    current: AtomicU64,
    apply: RwLock<()>,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }

    /// Start a new generation
    ///
    /// Blocks until deliveries in progress finish, unless called from
    /// inside a delivery on this gate.
    pub fn bump(&self) -> u64 {
        let _guard = (!self.delivering_here())
            .then(|| self.apply.write().unwrap_or_else(|e| e.into_inner()));
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run `apply` if `generation` is still current; returns whether it ran
    pub fn deliver<F: FnOnce()>(&self, generation: u64, apply: F) -> bool {
        let _guard = (!self.delivering_here())
            .then(|| self.apply.read().unwrap_or_else(|e| e.into_inner()));
        if self.current.load(Ordering::SeqCst) != generation {
            return false;
        }
        let _scope = DeliveryScope::enter(self.key());
        apply();
        true
    }

    fn key(&self) -> usize {
        self as *const Self as usize
    }

    fn delivering_here(&self) -> bool {
        let key = self.key();
        DELIVERING.with(|d| d.borrow().contains(&key))
    }
}

/// A finished page, as handed to the view
#[derive(Debug, Clone)]
pub struct PageReady {
    pub generation: u64,
    pub page_index: usize,
    pub image: Arc<PageImage>,
}

/// What the scheduler is doing for the active document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Opening,
    Rendering { generation: u64, pending: usize },
    Ready { generation: u64 },
}

/// Returned by `view_document`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTicket {
    pub generation: u64,
    pub page_count: usize,
}

enum Phase {
    Idle,
    Opening,
    Open {
        generation: u64,
        pending: Arc<AtomicUsize>,
    },
}

struct PageTask {
    cancelled: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl PageTask {
    fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // Only stops tasks still waiting for a permit
        self.join.abort();
    }
}

#[derive(Default)]
struct ActiveDocument {
    renderer: Option<Arc<PageRenderer>>,
    tasks: Vec<PageTask>,
}

/// Decrements the pending count when a page task ends, however it ends
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

type PageCallback = Arc<dyn Fn(PageReady) + Send + Sync>;

/// Schedules page renders for the active document
pub struct RenderScheduler {
    runtime: Handle,
    loader: Arc<dyn DocumentLoader>,
    dispatcher: Arc<dyn UiDispatcher>,
    settings: RenderSettings,
    permits: Arc<Semaphore>,
    gate: Arc<GenerationGate>,
    active: Mutex<ActiveDocument>,
    phase: Mutex<Phase>,
}

impl RenderScheduler {
    pub fn new(
        runtime: Handle,
        loader: Arc<dyn DocumentLoader>,
        dispatcher: Arc<dyn UiDispatcher>,
        settings: RenderSettings,
        workers: usize,
    ) -> Self {
        let workers = workers.max(1);
        debug!("Render scheduler with {} worker(s) at {} dpi", workers, settings.dpi());
        Self {
            runtime,
            loader,
            dispatcher,
            settings,
            permits: Arc::new(Semaphore::new(workers)),
            gate: Arc::new(GenerationGate::new()),
            active: Mutex::new(ActiveDocument::default()),
            phase: Mutex::new(Phase::Idle),
        }
    }

    /// Show `path`, rendering every page
    ///
    /// Work for the previous document is cancelled and its results are
    /// discarded. The renderer (and its page cache) is reused when `path`
    /// is already open. If the document cannot be opened the view is left
    /// empty and the error returned.
    pub fn view_document<F>(&self, path: &Path, on_page_ready: F) -> RenderResult<ViewTicket>
    where
        F: Fn(PageReady) + Send + Sync + 'static,
    {
        let generation = self.gate.bump();
        let mut active = self.lock_active();
        cancel_tasks(&mut active);

        let reusable = active
            .renderer
            .as_ref()
            .filter(|r| r.path() == path && !r.is_closed())
            .cloned();

        let renderer = match reusable {
            Some(renderer) => renderer,
            None => {
                if let Some(previous) = active.renderer.take() {
                    previous.close();
                }
                self.set_phase(Phase::Opening);

                match PageRenderer::open(self.loader.as_ref(), path, self.settings) {
                    Ok(renderer) => {
                        info!("Opened {:?} ({} pages)", path, renderer.page_count());
                        let renderer = Arc::new(renderer);
                        active.renderer = Some(Arc::clone(&renderer));
                        renderer
                    }
                    Err(e) => {
                        warn!("Failed to open {:?}: {}", path, e);
                        self.set_phase(Phase::Idle);
                        return Err(e);
                    }
                }
            }
        };

        let page_count = renderer.page_count();
        let pending = Arc::new(AtomicUsize::new(page_count));
        self.set_phase(Phase::Open {
            generation,
            pending: Arc::clone(&pending),
        });

        let on_page_ready: PageCallback = Arc::new(on_page_ready);
        for page_index in 0..page_count {
            let task = self.spawn_page(
                generation,
                page_index,
                Arc::clone(&renderer),
                Arc::clone(&on_page_ready),
                PendingGuard(Arc::clone(&pending)),
            );
            active.tasks.push(task);
        }

        Ok(ViewTicket {
            generation,
            page_count,
        })
    }

    /// Cancel everything, close the renderer and go idle
    pub fn clear(&self) {
        self.gate.bump();
        let mut active = self.lock_active();
        cancel_tasks(&mut active);
        if let Some(renderer) = active.renderer.take() {
            renderer.close();
        }
        self.set_phase(Phase::Idle);
    }

    pub fn state(&self) -> ViewState {
        match &*self.lock_phase() {
            Phase::Idle => ViewState::Idle,
            Phase::Opening => ViewState::Opening,
            Phase::Open {
                generation,
                pending,
            } => match pending.load(Ordering::SeqCst) {
                0 => ViewState::Ready {
                    generation: *generation,
                },
                pending => ViewState::Rendering {
                    generation: *generation,
                    pending,
                },
            },
        }
    }

    pub fn generation(&self) -> u64 {
        self.gate.current()
    }

    /// Path of the open document, if any
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current_renderer().map(|r| r.path().to_path_buf())
    }

    /// The open renderer, if any
    pub fn current_renderer(&self) -> Option<Arc<PageRenderer>> {
        self.lock_active().renderer.clone()
    }

    fn spawn_page(
        &self,
        generation: u64,
        page_index: usize,
        renderer: Arc<PageRenderer>,
        on_page_ready: PageCallback,
        pending: PendingGuard,
    ) -> PageTask {
        let cancelled = Arc::new(AtomicBool::new(false));
        let permits = Arc::clone(&self.permits);
        let gate = Arc::clone(&self.gate);
        let dispatcher = Arc::clone(&self.dispatcher);
        let flag = Arc::clone(&cancelled);

        let join = self.runtime.spawn(async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("Render pool closed, dropping page {}", page_index);
                    return;
                }
            };
            if flag.load(Ordering::SeqCst) {
                debug!("Skipping cancelled page {} (generation {})", page_index, generation);
                return;
            }

            let work = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let _pending = pending;
                if flag.load(Ordering::SeqCst) {
                    debug!("Skipping cancelled page {} (generation {})", page_index, generation);
                    return;
                }

                match renderer.render_page(page_index) {
                    Ok(image) if !flag.load(Ordering::SeqCst) => {
                        let ready = PageReady {
                            generation,
                            page_index,
                            image,
                        };
                        dispatcher.dispatch(Box::new(move || {
                            if !gate.deliver(generation, || on_page_ready(ready)) {
                                debug!(
                                    "Discarded stale page {} (generation {})",
                                    page_index, generation
                                );
                            }
                        }));
                    }
                    Ok(_) => debug!("Page {} finished after cancellation", page_index),
                    Err(e) if e.is_abort() => {
                        debug!("Page {} aborted: {}", page_index, e)
                    }
                    Err(e) => warn!("Page {} left blank: {}", page_index, e),
                }
            });

            if let Err(e) = work.await {
                if e.is_panic() {
                    error!("Render worker panicked on page {}", page_index);
                }
            }
        });

        PageTask { cancelled, join }
    }

    fn set_phase(&self, phase: Phase) {
        *self.lock_phase() = phase;
    }

    fn lock_active(&self) -> MutexGuard<'_, ActiveDocument> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn cancel_tasks(active: &mut ActiveDocument) {
    let cancelled = active.tasks.len();
    for task in active.tasks.drain(..) {
        task.cancel();
    }
    if cancelled > 0 {
        debug!("Cancelled {} page task(s)", cancelled);
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.clear();
    }
}
