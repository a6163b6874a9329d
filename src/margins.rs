//! Signed per-edge boundary refinement.
//!
//! Automatic detection usually lands within a pixel or two of the true strip
//! edge; this module applies the user's manual correction on top. Pure
//! dimension math, no I/O, no pixels.
//!
//! The adjustment is always recomputed from the untouched source rectangle,
//! so repeated identical calls never compound.

use crate::types::{Margins, Rect};
use thiserror::Error;

/// The requested margins would collapse the rectangle. The payload carries
/// the result clamped to a one-pixel minimum, which is what a shell should
/// keep showing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("margins collapse the boundary; clamped to {}x{}", clamped.width(), clamped.height())]
pub struct MarginOverflow {
    pub clamped: Rect,
}

/// Apply `margins` to `source`, clamped to `[0, width) × [0, height)`.
///
/// Positive margins shrink inward, negative expand outward. The result is
/// guaranteed at least 1×1 and inside the image; collapsing requests return
/// [`MarginOverflow`] carrying the clamped rectangle.
pub fn adjust(source: Rect, margins: Margins, bounds: (u32, u32)) -> Result<Rect, MarginOverflow> {
    let (width, height) = bounds;
    debug_assert!(width > 0 && height > 0);

    let left = (source.left as i64 + margins.left as i64).clamp(0, width as i64 - 1);
    let top = (source.top as i64 + margins.top as i64).clamp(0, height as i64 - 1);
    let right = (source.right as i64 - margins.right as i64).clamp(0, width as i64);
    let bottom = (source.bottom as i64 - margins.bottom as i64).clamp(0, height as i64);

    let collapsed = right <= left || bottom <= top;
    let adjusted = Rect {
        left: left as u32,
        top: top as u32,
        right: right.max(left + 1) as u32,
        bottom: bottom.max(top + 1) as u32,
    };

    if collapsed {
        Err(MarginOverflow { clamped: adjusted })
    } else {
        Ok(adjusted)
    }
}
