//! # plotclip
//!
//! A region extraction engine for plot rasters. Given a decoded image of a
//! CAE contour plot or similar figure, plotclip isolates a sub-region (a
//! color-legend strip, or an arbitrary contour area) from its background
//! and writes it out as its own image.
//!
//! # Architecture: Gesture → Refine → Correct → Export
//!
//! The engine is the pure core of two interactive tools. A shell (GUI or
//! otherwise) feeds it discrete gestures already converted to image
//! coordinates; the engine derives all state from them:
//!
//! ```text
//! 1. Gesture   coarse drag / clicks     (shell → image coordinates)
//! 2. Refine    detect / compose         (boundary or mask, published atomically)
//! 3. Correct   margins / zoom preview   (pixel-exact manual adjustment)
//! 4. Export    crop / mask + encode     (atomic file publish)
//! ```
//!
//! This separation exists for three reasons:
//!
//! - **Determinism**: every derived value (boundary, mask, preview) is a
//!   pure function of the image and the edit history, so identical gestures
//!   always reproduce identical output.
//! - **Recoverability**: each step returns a discriminated result; a failed
//!   operation never corrupts previously published state.
//! - **Testability**: the stages are plain functions over plain values, so
//!   the suite exercises pipeline logic on synthetic rasters without a UI.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`buffer`] | The decoded raster owned by a session, immutable per load |
//! | [`detect`] | Tightens a coarse selection to a saturated strip |
//! | [`margins`] | Signed per-edge refinement of a detected boundary |
//! | [`region`] | Rectangle/freehand regions unioned into a binary mask |
//! | [`zoom`] | 1×–10× nearest-neighbor preview and exact coordinate mapping |
//! | [`export`] | Crop/mask extraction, encoding, atomic file output |
//! | [`session`] | The owned editing context dispatching all of the above |
//! | [`types`] | Shared geometry values (`Point`, `Rect`, `Margins`) |
//!
//! # Design Decisions
//!
//! ## Adaptive Saturation Threshold
//!
//! Legend strips are chromatic on near-neutral surroundings, but palettes
//! vary wildly. The detector derives its threshold from the saturation
//! distribution inside the selection (percentile-based, scaled, floored)
//! instead of a fixed constant, and every knob is a public
//! [`detect::DetectParams`] field.
//!
//! ## Declarative Masks
//!
//! The mask is always exactly the union of the current region list,
//! recomputed in full on any change. Incremental patching would be faster
//! and wrong: removal and undo/redo need the mask to be a function of the
//! list, not of its edit order.
//!
//! ## Integer Zoom
//!
//! Zoom factors are whole numbers and resampling is nearest-neighbor, so the
//! display↔image mapping is exact in both directions. The preview exists to
//! verify boundaries pixel by pixel; a smoothed preview would lie about
//! exactly the thing being checked.

pub mod buffer;
pub mod detect;
pub mod export;
pub mod margins;
pub mod region;
pub mod session;
pub mod types;
pub mod zoom;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use buffer::{BufferError, ImageBuffer};
pub use detect::{DetectError, DetectParams};
pub use export::{ExportFormat, ExportReport, ExportTarget, WriteError};
pub use margins::MarginOverflow;
pub use region::{Mask, PolygonError, Region, RegionId, RegionShape};
pub use session::{SelectionOutcome, Session, SessionError, Tool};
pub use types::{Margins, Point, Rect};
pub use zoom::{Viewport, ZoomState};
