//! Page renderer
//!
//! Wraps one opened document and caches every page it rasterizes. The
//! source lock covers the cache lookup and the rasterization, so concurrent
//! requests for the same page render it once and share the result.
//! Rendering of one document is therefore serialized even when requests
//! arrive from several workers, and completion order is unspecified.
//!
//! `close` never waits for that lock. It marks the renderer closed and
//! releases the document if it is idle; otherwise the render in flight
//! releases it when it finishes, and its result is discarded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tracing::debug;

use super::error::{RenderError, RenderResult};
use super::page::{PageImage, RenderSettings};
use super::source::{DocumentLoader, PageSource};

/// One open document plus its page cache
pub struct PageRenderer {
    path: PathBuf,
    page_count: usize,
    dpi: f32,
    closed: AtomicBool,
    source: Mutex<Option<Box<dyn PageSource>>>,
    cache: Mutex<HashMap<usize, Arc<PageImage>>>,
}

impl PageRenderer {
    /// Open `path` through `loader`
    pub fn open(
        loader: &dyn DocumentLoader,
        path: &Path,
        settings: RenderSettings,
    ) -> RenderResult<Self> {
        let source = loader.open(path)?;
        Ok(Self::from_source(path, source, settings))
    }

    /// Wrap an already opened source
    pub fn from_source(path: &Path, source: Box<dyn PageSource>, settings: RenderSettings) -> Self {
        Self {
            path: path.to_path_buf(),
            page_count: source.page_count(),
            dpi: settings.dpi(),
            closed: AtomicBool::new(false),
            source: Mutex::new(Some(source)),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Render one page, or return the cached image
    ///
    /// A second call for the same page returns the same `Arc`. Fails with
    /// `Closed` if the renderer is closed before or during the render.
    pub fn render_page(&self, index: usize) -> RenderResult<Arc<PageImage>> {
        if index >= self.page_count {
            return Err(RenderError::OutOfRange {
                index,
                page_count: self.page_count,
            });
        }

        let result = self.render_locked(index);
        self.release_if_closed();
        result
    }

    /// Release the document and drop the cache
    ///
    /// Safe to call more than once; later renders fail with `Closed`.
    /// Returns without waiting for a render in flight.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.lock_cache().clear();
        self.release_if_closed();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of pages currently cached
    pub fn cached_pages(&self) -> usize {
        self.lock_cache().len()
    }

    fn render_locked(&self, index: usize) -> RenderResult<Arc<PageImage>> {
        let mut source = self.source.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_closed() {
            return Err(RenderError::Closed);
        }
        if let Some(image) = self.lock_cache().get(&index) {
            return Ok(Arc::clone(image));
        }

        let source = source.as_mut().ok_or(RenderError::Closed)?;
        let image = Arc::new(source.rasterize(index, self.dpi)?);

        let mut cache = self.lock_cache();
        if self.is_closed() {
            debug!("Dropped page {} of closed {:?}", index, self.path);
            return Err(RenderError::Closed);
        }
        cache.insert(index, Arc::clone(&image));
        debug!("Rendered page {} of {:?}", index, self.path);
        Ok(image)
    }

    /// Drop the document once closed, unless a render still holds it
    fn release_if_closed(&self) {
        if !self.is_closed() {
            return;
        }
        let mut source = match self.source.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        if source.take().is_some() {
            debug!("Closed renderer for {:?}", self.path);
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<usize, Arc<PageImage>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for PageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRenderer")
            .field("path", &self.path)
            .field("page_count", &self.page_count)
            .field("dpi", &self.dpi)
            .finish()
    }
}
