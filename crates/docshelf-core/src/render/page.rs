//! Rendered page images and render resolution

use std::path::Path;

use image::{ExtendedColorType, ImageResult, RgbaImage};

/// Resolution pages are rasterized at
///
/// Sources are treated as scanned at `base_dpi`; the effective resolution
/// is `base_dpi * multiplier`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub base_dpi: f32,
    pub multiplier: f32,
}

impl RenderSettings {
    pub const BASE_DPI: f32 = 150.0;
    pub const MULTIPLIER: f32 = 2.0;

    /// Effective rasterization resolution
    pub fn dpi(&self) -> f32 {
        self.base_dpi * self.multiplier
    }

    /// Scale factor from a source at `BASE_DPI` to the effective resolution
    pub fn scale(&self) -> f32 {
        self.dpi() / Self::BASE_DPI
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            base_dpi: Self::BASE_DPI,
            multiplier: Self::MULTIPLIER,
        }
    }
}

/// A rasterized page in RGBA8, independent of any UI toolkit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PageImage {
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixel data, row major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy into an `image` buffer
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// Encode to a file; the format follows the extension
    pub fn save(&self, path: &Path) -> ImageResult<()> {
        image::save_buffer(
            path,
            &self.pixels,
            self.width,
            self.height,
            ExtendedColorType::Rgba8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use tempfile::TempDir;

    #[test]
    fn test_default_settings_render_at_300_dpi() {
        let settings = RenderSettings::default();
        assert_eq!(settings.dpi(), 300.0);
        assert_eq!(settings.scale(), 2.0);
    }

    #[test]
    fn test_page_image_keeps_pixels() {
        let buffer: RgbaImage = ImageBuffer::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let page = PageImage::from_rgba(buffer.clone());

        assert_eq!((page.width(), page.height()), (3, 2));
        assert_eq!(page.pixels().len(), 3 * 2 * 4);
        assert_eq!(page.to_rgba_image(), Some(buffer));
    }

    #[test]
    fn test_save_png() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("page-1.png");
        let page = PageImage::from_rgba(ImageBuffer::from_pixel(4, 4, Rgba([0, 0, 0, 255])));

        page.save(&path).unwrap();

        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.width(), 4);
    }
}
