//! Document sources
//!
//! `DocumentLoader` opens a file into a `PageSource`, the handle a
//! `PageRenderer` rasterizes pages from. Sources are not reentrant; the
//! renderer serializes access to them.
//!
//! `FormatLoader` picks a loader from the file's leading bytes: PDFs go to
//! `PdfLoader`, everything else to `RasterLoader`, which handles scanned
//! documents stored as images (a still image has one page, an animated GIF
//! has one page per frame).

use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, ImageFormat, RgbaImage};
use tracing::debug;

use super::error::{RenderError, RenderResult};
use super::page::{PageImage, RenderSettings};
use super::pdf::PdfLoader;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// An opened document
pub trait PageSource: Send {
    fn page_count(&self) -> usize;

    /// Rasterize one page at `dpi`; `index` is already range-checked
    fn rasterize(&mut self, index: usize, dpi: f32) -> RenderResult<PageImage>;
}

/// Opens documents into page sources
pub trait DocumentLoader: Send + Sync {
    fn open(&self, path: &Path) -> RenderResult<Box<dyn PageSource>>;
}

/// Loader for every document format the archive renders
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatLoader {
    pdf: PdfLoader,
    raster: RasterLoader,
}

impl FormatLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentLoader for FormatLoader {
    fn open(&self, path: &Path) -> RenderResult<Box<dyn PageSource>> {
        let open_err = |e| RenderError::Open {
            path: path.to_path_buf(),
            source: e,
        };
        let mut header = Vec::with_capacity(PDF_MAGIC.len());
        File::open(path)
            .map_err(open_err)?
            .take(PDF_MAGIC.len() as u64)
            .read_to_end(&mut header)
            .map_err(open_err)?;

        if header == PDF_MAGIC {
            self.pdf.open(path)
        } else {
            self.raster.open(path)
        }
    }
}

/// Loader for image-based documents
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterLoader;

impl RasterLoader {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLoader for RasterLoader {
    fn open(&self, path: &Path) -> RenderResult<Box<dyn PageSource>> {
        let bytes = fs::read(path).map_err(|e| RenderError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let decode_err = |e: image::ImageError| RenderError::Decode {
            path: path.to_path_buf(),
            details: e.to_string(),
        };

        let format = image::guess_format(&bytes).map_err(decode_err)?;
        let pages: Vec<RgbaImage> = if format == ImageFormat::Gif {
            let decoder = GifDecoder::new(Cursor::new(&bytes)).map_err(decode_err)?;
            decoder
                .into_frames()
                .collect_frames()
                .map_err(decode_err)?
                .into_iter()
                .map(|frame| frame.into_buffer())
                .collect()
        } else {
            vec![image::load_from_memory_with_format(&bytes, format)
                .map_err(decode_err)?
                .to_rgba8()]
        };

        if pages.is_empty() {
            return Err(RenderError::Decode {
                path: path.to_path_buf(),
                details: "document has no pages".to_string(),
            });
        }

        debug!("Opened {:?} as {:?} with {} page(s)", path, format, pages.len());
        Ok(Box::new(RasterSource { pages }))
    }
}

/// Decoded pages of an image document
struct RasterSource {
    pages: Vec<RgbaImage>,
}

impl PageSource for RasterSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn rasterize(&mut self, index: usize, dpi: f32) -> RenderResult<PageImage> {
        let page = self.pages.get(index).ok_or(RenderError::OutOfRange {
            index,
            page_count: self.pages.len(),
        })?;

        let scale = dpi / RenderSettings::BASE_DPI;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::Rasterize {
                index,
                details: format!("invalid resolution {} dpi", dpi),
            });
        }

        let width = scaled(page.width(), scale);
        let height = scaled(page.height(), scale);
        if (width, height) == page.dimensions() {
            return Ok(PageImage::from_rgba(page.clone()));
        }

        let resized = imageops::resize(page, width, height, FilterType::Triangle);
        Ok(PageImage::from_rgba(resized))
    }
}

fn scaled(length: u32, scale: f32) -> u32 {
    ((length as f32 * scale).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, ImageBuffer, Rgba};
    use std::fs::File;
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let buffer: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([200, 10, 10, 255]));
        buffer.save(&path).unwrap();
        path
    }

    fn write_gif(dir: &TempDir, name: &str, frames: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        let mut encoder = GifEncoder::new(file);
        let frames = (0..frames).map(|i| {
            let shade = (i * 40) as u8;
            let buffer: RgbaImage = ImageBuffer::from_pixel(8, 6, Rgba([shade, shade, shade, 255]));
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
        });
        encoder.encode_frames(frames).unwrap();
        path
    }

    #[test]
    fn test_still_image_is_one_page() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_png(&temp_dir, "scan.png", 10, 20);

        let source = RasterLoader::new().open(&path).unwrap();
        assert_eq!(source.page_count(), 1);
    }

    #[test]
    fn test_rasterize_scales_to_dpi() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_png(&temp_dir, "scan.png", 10, 20);
        let mut source = RasterLoader::new().open(&path).unwrap();

        let page = source.rasterize(0, 300.0).unwrap();
        assert_eq!((page.width(), page.height()), (20, 40));

        let native = source.rasterize(0, 150.0).unwrap();
        assert_eq!((native.width(), native.height()), (10, 20));
    }

    #[test]
    fn test_gif_frames_are_pages() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_gif(&temp_dir, "pages.gif", 3);

        let mut source = RasterLoader::new().open(&path).unwrap();
        assert_eq!(source.page_count(), 3);
        let last = source.rasterize(2, 300.0).unwrap();
        assert_eq!((last.width(), last.height()), (16, 12));
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = RasterLoader::new().open(&temp_dir.path().join("missing.png"));
        assert!(matches!(result, Err(RenderError::Open { .. })));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, "just some text").unwrap();

        let result = RasterLoader::new().open(&path);
        assert!(matches!(result, Err(RenderError::Decode { .. })));
    }

    #[test]
    fn test_format_loader_sends_images_to_raster() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_gif(&temp_dir, "scan.pdf.gif", 2);

        let source = FormatLoader::new().open(&path).unwrap();
        assert_eq!(source.page_count(), 2);
    }

    #[test]
    fn test_format_loader_sends_pdf_header_to_pdf() {
        let temp_dir = TempDir::new().unwrap();
        // Named like an image; the header decides
        let path = temp_dir.path().join("scan.png");
        std::fs::write(&path, b"%PDF-1.7\nnot really").unwrap();

        match FormatLoader::new().open(&path) {
            Err(RenderError::Decode { details, .. }) => assert!(!details.contains("image format")),
            Err(other) => panic!("expected decode error, got {}", other),
            Ok(_) => panic!("garbage PDF opened"),
        }
    }

    #[test]
    fn test_format_loader_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = FormatLoader::new().open(&temp_dir.path().join("gone.pdf"));
        assert!(matches!(result, Err(RenderError::Open { .. })));
    }

    #[test]
    fn test_invalid_dpi_is_rasterize_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_png(&temp_dir, "scan.png", 2, 2);
        let mut source = RasterLoader::new().open(&path).unwrap();

        let result = source.rasterize(0, 0.0);
        assert!(matches!(result, Err(RenderError::Rasterize { index: 0, .. })));
    }
}
