//! The decoded raster owned by an edit session.
//!
//! [`ImageBuffer`] wraps the decoded pixels and is immutable after load:
//! every downstream stage (detection, masking, zoom, export) reads from it
//! and produces derived values, never patches it in place. Inputs are
//! widened to RGBA internally; whether the source actually carried an alpha
//! channel is recorded so the exporter can pick an encoder layout.

use crate::types::Rect;
use image::{DynamicImage, ImageReader, RgbaImage};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// An immutable 8-bit raster, origin top-left.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pixels: RgbaImage,
    has_alpha: bool,
}

impl ImageBuffer {
    /// Decode an image file. JPEG, PNG, BMP, and TIFF decoders are compiled in.
    pub fn open(path: &Path) -> Result<Self, BufferError> {
        let decoded = ImageReader::open(path)
            .map_err(BufferError::Io)?
            .decode()
            .map_err(|e| BufferError::Decode {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_dynamic(decoded))
    }

    /// Wrap an already-decoded image (the usual path: the shell decodes and
    /// hands the raster over).
    pub fn from_dynamic(decoded: DynamicImage) -> Self {
        let has_alpha = decoded.color().has_alpha();
        Self {
            pixels: decoded.into_rgba8(),
            has_alpha,
        }
    }

    /// Wrap raw RGBA pixels.
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            has_alpha: true,
        }
    }

    /// Wrap raw RGB pixels (widened to RGBA, alpha flag cleared).
    pub fn from_rgb(pixels: image::RgbImage) -> Self {
        Self {
            pixels: DynamicImage::ImageRgb8(pixels).into_rgba8(),
            has_alpha: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Whether the decoded source carried an alpha channel.
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Color channels of the pixel at `(x, y)`. Alpha is ignored: detection
    /// works on chromaticity only.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let p = self.pixels.get_pixel(x, y).0;
        [p[0], p[1], p[2]]
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Copy out a sub-rectangle. The caller guarantees `rect` lies inside
    /// the image (every `Rect` published by the pipeline does).
    pub fn crop(&self, rect: Rect) -> RgbaImage {
        image::imageops::crop_imm(&self.pixels, rect.left, rect.top, rect.width(), rect.height())
            .to_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        })
    }

    #[test]
    fn open_decodes_png() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.png");
        gradient(64, 48).save(&path).unwrap();

        let buf = ImageBuffer::open(&path).unwrap();
        assert_eq!(buf.dimensions(), (64, 48));
        assert_eq!(buf.rgb_at(10, 20), [10, 20, 128]);
    }

    #[test]
    fn open_nonexistent_errors() {
        let result = ImageBuffer::open(Path::new("/nonexistent/image.png"));
        assert!(matches!(result, Err(BufferError::Io(_))));
    }

    #[test]
    fn rgb_source_clears_alpha_flag() {
        let rgb = image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]));
        let buf = ImageBuffer::from_rgb(rgb);
        assert!(!buf.has_alpha());
        assert_eq!(buf.rgb_at(0, 0), [1, 2, 3]);
    }

    #[test]
    fn rgba_source_keeps_alpha_flag() {
        let buf = ImageBuffer::from_rgba(gradient(4, 4));
        assert!(buf.has_alpha());
    }

    #[test]
    fn crop_extracts_subrect() {
        let buf = ImageBuffer::from_rgba(gradient(32, 32));
        let crop = buf.crop(Rect {
            left: 4,
            top: 8,
            right: 12,
            bottom: 14,
        });
        assert_eq!(crop.dimensions(), (8, 6));
        // Top-left of the crop is pixel (4, 8) of the source.
        assert_eq!(crop.get_pixel(0, 0).0[0], 4);
        assert_eq!(crop.get_pixel(0, 0).0[1], 8);
    }
}
