//! Magnified preview rendering and display↔image coordinate mapping.
//!
//! Everything here is pure view math: a [`ZoomState`] never mutates the
//! image, the mask, or a boundary. Zoom factors are whole numbers from 1×
//! to 10× and resampling is nearest-neighbor, because the preview exists to
//! verify boundaries pixel by pixel, not to look smooth.
//!
//! The mapping is exact by construction: display coordinates are
//! `(p − origin) · z`, image coordinates are `origin + d / z`, both in
//! integers, so `to_image(to_display(p)) == p` for every visible pixel at
//! every factor. Any rounding slack here would silently corrupt the
//! boundaries driven through it.

use crate::region::BACKGROUND;
use crate::types::{Point, Rect};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

pub const MIN_FACTOR: u32 = 1;
pub const MAX_FACTOR: u32 = 10;

/// Current magnification and view center, in the coordinates of the raster
/// being previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomState {
    factor: u32,
    center: Point,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self {
            factor: MIN_FACTOR,
            center: Point::new(0, 0),
        }
    }
}

impl ZoomState {
    /// Factors outside 1–10 are clamped, never rejected: a slider is the
    /// usual source and clamping matches what it shows.
    pub fn new(factor: u32, center: Point) -> Self {
        Self {
            factor: factor.clamp(MIN_FACTOR, MAX_FACTOR),
            center,
        }
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    pub fn center(&self) -> Point {
        self.center
    }

    /// Resolve which part of a `content`-sized raster a viewport of `size`
    /// display pixels shows. The visible rectangle is centered on
    /// [`ZoomState::center`] and pushed back inside the content when the
    /// center sits near an edge.
    pub fn viewport(&self, content: (u32, u32), size: (u32, u32)) -> Viewport {
        let (cw, ch) = content;
        let (vw, vh) = size;
        let z = self.factor;

        let src_w = vw.div_ceil(z).clamp(1, cw.max(1));
        let src_h = vh.div_ceil(z).clamp(1, ch.max(1));

        let left = self
            .center
            .x
            .saturating_sub(src_w / 2)
            .min(cw.saturating_sub(src_w));
        let top = self
            .center
            .y
            .saturating_sub(src_h / 2)
            .min(ch.saturating_sub(src_h));

        Viewport {
            visible: Rect {
                left,
                top,
                right: left + src_w,
                bottom: top + src_h,
            },
            factor: z,
        }
    }
}

/// A resolved view: the visible source rectangle and the factor mapping it
/// onto the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub visible: Rect,
    pub factor: u32,
}

impl Viewport {
    /// Display position of the top-left corner of image pixel `p`, or `None`
    /// when `p` is outside the visible rectangle.
    pub fn to_display(&self, p: Point) -> Option<(u32, u32)> {
        if !self.visible.contains(p) {
            return None;
        }
        Some((
            (p.x - self.visible.left) * self.factor,
            (p.y - self.visible.top) * self.factor,
        ))
    }

    /// Image pixel under a display position. Total: pointer positions over
    /// the background slack beyond the content clamp to the nearest visible
    /// pixel, so a drag that overshoots the edge still lands on the edge.
    pub fn to_image(&self, display: (u32, u32)) -> Point {
        let x = (self.visible.left + display.0 / self.factor).min(self.visible.right - 1);
        let y = (self.visible.top + display.1 / self.factor).min(self.visible.bottom - 1);
        Point::new(x, y)
    }
}

/// Magnify the visible part of `content` into a `size` display buffer with
/// nearest-neighbor replication. Display slack beyond the content is filled
/// with the background color. At 1× this is a plain copy of the visible
/// crop.
pub fn render_viewport(content: &RgbaImage, zoom: &ZoomState, size: (u32, u32)) -> RgbaImage {
    let (vw, vh) = size;
    let vp = zoom.viewport(content.dimensions(), size);
    let mut out = RgbaImage::from_pixel(vw, vh, BACKGROUND);

    for dy in 0..vh {
        let sy = vp.visible.top + dy / vp.factor;
        if sy >= vp.visible.bottom {
            break;
        }
        for dx in 0..vw {
            let sx = vp.visible.left + dx / vp.factor;
            if sx >= vp.visible.right {
                break;
            }
            out.put_pixel(dx, dy, *content.get_pixel(sx, sy));
        }
    }
    out
}
