//! Fake documents for render tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{ImageBuffer, Rgba};

use super::error::{RenderError, RenderResult};
use super::page::PageImage;
use super::source::{DocumentLoader, PageSource};

/// Loader serving in-memory documents with configurable page delays
#[derive(Clone, Default)]
pub struct FakeLoader {
    documents: Arc<Mutex<HashMap<PathBuf, FakeDocument>>>,
    rasterized: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct FakeDocument {
    pages: usize,
    delay: Duration,
    failing: HashSet<usize>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: &str, pages: usize, delay: Duration) -> Self {
        self.documents.lock().unwrap().insert(
            PathBuf::from(path),
            FakeDocument {
                pages,
                delay,
                failing: HashSet::new(),
            },
        );
        self
    }

    pub fn failing_page(self, path: &str, index: usize) -> Self {
        if let Some(doc) = self.documents.lock().unwrap().get_mut(Path::new(path)) {
            doc.failing.insert(index);
        }
        self
    }

    /// Total pages rasterized across every source
    pub fn rasterized(&self) -> usize {
        self.rasterized.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sources dropped so far
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl DocumentLoader for FakeLoader {
    fn open(&self, path: &Path) -> RenderResult<Box<dyn PageSource>> {
        let doc = self
            .documents
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| RenderError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such document"),
            })?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSource {
            doc,
            rasterized: Arc::clone(&self.rasterized),
            released: Arc::clone(&self.released),
        }))
    }
}

struct FakeSource {
    doc: FakeDocument,
    rasterized: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl PageSource for FakeSource {
    fn page_count(&self) -> usize {
        self.doc.pages
    }

    /// Pages are `index + 1` pixels wide so tests can tell them apart
    fn rasterize(&mut self, index: usize, _dpi: f32) -> RenderResult<PageImage> {
        std::thread::sleep(self.doc.delay);
        self.rasterized.fetch_add(1, Ordering::SeqCst);
        if self.doc.failing.contains(&index) {
            return Err(RenderError::Rasterize {
                index,
                details: "corrupt page".to_string(),
            });
        }
        let buffer = ImageBuffer::from_pixel(index as u32 + 1, 1, Rgba([0, 0, 0, 255]));
        Ok(PageImage::from_rgba(buffer))
    }
}
