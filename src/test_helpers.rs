//! Shared test fixtures: synthetic rasters built programmatically.
//!
//! No image files are checked in; every test paints the pixels it needs.

use crate::buffer::ImageBuffer;
use crate::types::{Point, Rect};
use image::{Rgb, RgbImage};

/// Build an RGB canvas from a per-pixel color function.
pub fn canvas_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> ImageBuffer {
    ImageBuffer::from_rgb(RgbImage::from_fn(width, height, |x, y| Rgb(f(x, y))))
}

/// A uniformly neutral canvas: zero saturation everywhere.
pub fn neutral_canvas(width: u32, height: u32, gray: u8) -> ImageBuffer {
    canvas_fn(width, height, move |_, _| [gray; 3])
}

/// A neutral-gray canvas with one saturated rectangle, the shape of a color
/// legend strip.
pub fn strip_canvas(width: u32, height: u32, strip: Rect, color: [u8; 3]) -> ImageBuffer {
    canvas_fn(width, height, move |x, y| {
        if strip.contains(Point::new(x, y)) {
            color
        } else {
            [128, 128, 128]
        }
    })
}
