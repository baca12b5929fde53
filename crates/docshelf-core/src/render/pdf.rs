//! PDF documents
//!
//! Rasterized with Pdfium through `pdfium-render`. The Pdfium library is
//! bound once per process, from the working directory first and then from
//! the system library path. When it cannot be found, opening a PDF fails
//! with `RenderError::Decode` and image documents keep working.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use image::RgbaImage;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::error::{RenderError, RenderResult};
use super::page::PageImage;
use super::source::{DocumentLoader, PageSource};

/// PDF user space units per inch
const POINTS_PER_INCH: f32 = 72.0;

static PDFIUM: OnceLock<Result<Pdfium, String>> = OnceLock::new();

/// The process-wide Pdfium binding
fn pdfium() -> Result<&'static Pdfium, &'static str> {
    PDFIUM
        .get_or_init(|| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map(Pdfium::new)
                .map_err(|e| {
                    warn!("Pdfium library not available: {}", e);
                    e.to_string()
                })
        })
        .as_ref()
        .map_err(String::as_str)
}

/// Loader for PDF files
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }

    /// Whether the Pdfium library could be bound
    pub fn is_available() -> bool {
        pdfium().is_ok()
    }
}

impl DocumentLoader for PdfLoader {
    fn open(&self, path: &Path) -> RenderResult<Box<dyn PageSource>> {
        let bytes = fs::read(path).map_err(|e| RenderError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let pdfium = pdfium().map_err(|e| RenderError::Decode {
            path: path.to_path_buf(),
            details: format!("PDF support unavailable: {}", e),
        })?;

        let document = pdfium
            .load_pdf_from_byte_vec(bytes, None)
            .map_err(|e| RenderError::Decode {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;

        let page_count = document.pages().len() as usize;
        if page_count == 0 {
            return Err(RenderError::Decode {
                path: path.to_path_buf(),
                details: "document has no pages".to_string(),
            });
        }

        debug!("Opened {:?} as PDF with {} page(s)", path, page_count);
        Ok(Box::new(PdfSource {
            path: path.to_path_buf(),
            document,
            page_count,
        }))
    }
}

struct PdfSource {
    path: PathBuf,
    document: PdfDocument<'static>,
    page_count: usize,
}

impl PageSource for PdfSource {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn rasterize(&mut self, index: usize, dpi: f32) -> RenderResult<PageImage> {
        let rasterize_err = |details: String| RenderError::Rasterize { index, details };

        if !dpi.is_finite() || dpi <= 0.0 {
            return Err(rasterize_err(format!("invalid resolution {} dpi", dpi)));
        }
        let page_index = PdfPageIndex::try_from(index).map_err(|_| RenderError::OutOfRange {
            index,
            page_count: self.page_count,
        })?;

        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|e| rasterize_err(e.to_string()))?;
        let config = PdfRenderConfig::new().scale_page_by_factor(dpi / POINTS_PER_INCH);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| rasterize_err(e.to_string()))?;

        let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
        let buffer = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
            .ok_or_else(|| rasterize_err(format!("short bitmap for {}x{} page", width, height)))?;

        debug!("Rasterized page {} of {:?} at {} dpi", index, self.path, dpi);
        Ok(PageImage::from_rgba(buffer))
    }
}
