//! The owned editing session: one image, one set of derived edit state.
//!
//! Every operation of the engine is a method on [`Session`], which owns the
//! [`ImageBuffer`] plus the current boundary, margins, region list, mask,
//! and zoom state. The shell dispatches gestures (already converted to image
//! coordinates) as explicit commands; nothing here holds a reference to any
//! UI object.
//!
//! Publishing is atomic at command granularity: a command computes its full
//! replacement state (boundary or mask) before assigning it, so a renderer
//! or exporter called between commands never observes a partial update. A
//! failed command leaves previously published state untouched, with one
//! documented exception: a margin overflow publishes the clamped rectangle,
//! which is the value the shell keeps displaying.

use crate::buffer::ImageBuffer;
use crate::detect::{self, DetectError, DetectParams};
use crate::export::{self, ExportFormat, ExportReport, ExportTarget, WriteError};
use crate::margins::{self, MarginOverflow};
use crate::region::{self, Mask, PolygonError, Region, RegionId};
use crate::types::{Margins, Point, Rect};
use crate::zoom::{self, ZoomState};
use image::RgbaImage;
use log::{debug, warn};
use std::path::Path;
use thiserror::Error;

/// Drags smaller than this per side are treated as accidental clicks.
pub const MIN_SELECTION: u32 = 5;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Margin(#[from] MarginOverflow),
    #[error(transparent)]
    Polygon(#[from] PolygonError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("selection must be at least {MIN_SELECTION} pixels per side")]
    SelectionTooSmall,
    #[error("nothing is selected")]
    NothingSelected,
    #[error("no region with that id")]
    UnknownRegion,
}

/// Active selection tool. Switching tools discards an in-progress freehand
/// gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Rectangle,
    Freehand,
}

/// Result of a coarse selection: the published boundary, and whether
/// detection fell back to the coarse rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionOutcome {
    pub boundary: Rect,
    pub fallback: bool,
}

pub struct Session {
    image: ImageBuffer,
    detect_params: DetectParams,
    coarse: Option<Rect>,
    detected: Option<Rect>,
    margins: Margins,
    adjusted: Option<Rect>,
    regions: Vec<Region>,
    mask: Option<Mask>,
    next_region: u64,
    pending: Vec<Point>,
    tool: Tool,
    zoom: ZoomState,
    invert: bool,
}

impl Session {
    pub fn new(image: ImageBuffer) -> Self {
        Self::with_params(image, DetectParams::default())
    }

    pub fn with_params(image: ImageBuffer, detect_params: DetectParams) -> Self {
        Self {
            image,
            detect_params,
            coarse: None,
            detected: None,
            margins: Margins::default(),
            adjusted: None,
            regions: Vec::new(),
            mask: None,
            next_region: 0,
            pending: Vec::new(),
            tool: Tool::default(),
            zoom: ZoomState::default(),
            invert: false,
        }
    }

    /// Replace the image and reset every piece of derived edit state,
    /// including an in-progress freehand gesture.
    pub fn load(&mut self, image: ImageBuffer) {
        *self = Self::with_params(image, self.detect_params);
    }

    pub fn image(&self) -> &ImageBuffer {
        &self.image
    }

    /// The currently published boundary: margin-adjusted if margins were
    /// applied, else detected, else the coarse selection.
    pub fn boundary(&self) -> Option<Rect> {
        self.adjusted.or(self.detected).or(self.coarse)
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn zoom(&self) -> ZoomState {
        self.zoom
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    pub fn pending_vertices(&self) -> &[Point] {
        &self.pending
    }

    pub fn detect_params(&self) -> DetectParams {
        self.detect_params
    }

    pub fn set_detect_params(&mut self, params: DetectParams) {
        self.detect_params = params;
    }

    // --- Boundary workflow -------------------------------------------------

    /// End of a coarse drag: normalize the corners, tighten via saturation
    /// detection, and publish the result. Detection failure is recoverable:
    /// the coarse rectangle itself is published and `fallback` reports it.
    pub fn select(&mut self, a: Point, b: Point) -> Result<SelectionOutcome, SessionError> {
        let sel = self.sized_selection(a, b)?;

        let (boundary, fallback) = match detect::detect(&self.image, sel, &self.detect_params) {
            Ok(found) => (found, false),
            Err(DetectError::NoSaturatedContent) => {
                warn!("detection found no saturated content; keeping coarse selection");
                (sel, true)
            }
        };

        self.coarse = Some(sel);
        self.detected = Some(boundary);
        self.margins = Margins::default();
        self.adjusted = Some(boundary);
        debug!(
            "select: published ({},{})-({},{}) fallback={fallback}",
            boundary.left, boundary.top, boundary.right, boundary.bottom
        );
        Ok(SelectionOutcome { boundary, fallback })
    }

    /// Re-run detection on the stored coarse selection, e.g. after changing
    /// [`DetectParams`]. Unlike [`Session::select`], a failure here leaves
    /// the published boundary untouched and surfaces the error.
    pub fn redetect(&mut self) -> Result<Rect, SessionError> {
        let sel = self.coarse.ok_or(SessionError::NothingSelected)?;
        let found = detect::detect(&self.image, sel, &self.detect_params)?;
        self.detected = Some(found);
        self.republish_boundary()?;
        Ok(found)
    }

    /// Apply margin offsets to the detected boundary (or the coarse
    /// fallback). Always recomputed from the untouched source, so repeated
    /// identical calls publish identical results.
    pub fn set_margins(&mut self, margins: Margins) -> Result<Rect, SessionError> {
        let source = self
            .detected
            .or(self.coarse)
            .ok_or(SessionError::NothingSelected)?;

        self.margins = margins;
        match margins::adjust(source, margins, self.image.dimensions()) {
            Ok(adjusted) => {
                self.adjusted = Some(adjusted);
                Ok(adjusted)
            }
            Err(overflow) => {
                self.adjusted = Some(overflow.clamped);
                Err(overflow.into())
            }
        }
    }

    fn republish_boundary(&mut self) -> Result<Rect, SessionError> {
        self.set_margins(self.margins)
    }

    // --- Region workflow ---------------------------------------------------

    pub fn set_tool(&mut self, tool: Tool) {
        if tool != self.tool {
            self.cancel_pending();
            self.tool = tool;
        }
    }

    /// One click of a freehand gesture. Vertices are clamped into the image.
    pub fn push_vertex(&mut self, p: Point) {
        let (width, height) = self.image.dimensions();
        self.pending
            .push(Point::new(p.x.min(width - 1), p.y.min(height - 1)));
    }

    /// Discard the in-progress freehand gesture without committing it.
    pub fn cancel_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!("discarding {} pending vertices", self.pending.len());
            self.pending.clear();
        }
    }

    /// Close the freehand gesture and commit it as a region. On a malformed
    /// gesture the pending vertices stay, so the user can keep clicking.
    pub fn finish_polygon(&mut self) -> Result<RegionId, SessionError> {
        region::validate_polygon(&self.pending)?;
        let id = self.fresh_id();
        let vertices = std::mem::take(&mut self.pending);
        let polygon = Region::polygon(id, vertices).map_err(SessionError::Polygon)?;
        self.regions.push(polygon);
        self.republish_mask();
        Ok(id)
    }

    /// Commit a rectangle gesture as a region.
    pub fn add_rectangle(&mut self, a: Point, b: Point) -> Result<RegionId, SessionError> {
        let rect = self.sized_selection(a, b)?;
        let id = self.fresh_id();
        self.regions.push(Region::rectangle(id, rect));
        self.republish_mask();
        Ok(id)
    }

    /// Remove a region by identity; the mask is fully recomputed from the
    /// remaining list.
    pub fn remove_region(&mut self, id: RegionId) -> Result<(), SessionError> {
        let index = self
            .regions
            .iter()
            .position(|r| r.id() == id)
            .ok_or(SessionError::UnknownRegion)?;
        self.regions.remove(index);
        self.republish_mask();
        Ok(())
    }

    /// Remove the most recently added region, if any.
    pub fn remove_last_region(&mut self) -> Option<RegionId> {
        let removed = self.regions.pop()?;
        self.republish_mask();
        Some(removed.id())
    }

    pub fn clear_regions(&mut self) {
        self.regions.clear();
        self.cancel_pending();
        self.republish_mask();
    }

    /// Preview/export style: keep inside the mask, or keep outside and paint
    /// the covered area with the background. Never touches the mask itself.
    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }

    fn fresh_id(&mut self) -> RegionId {
        let id = RegionId::new(self.next_region);
        self.next_region += 1;
        id
    }

    fn republish_mask(&mut self) {
        let (width, height) = self.image.dimensions();
        let mask = region::compose(&self.regions, width, height);
        self.mask = Some(mask);
    }

    // --- View --------------------------------------------------------------

    pub fn set_zoom(&mut self, factor: u32, center: Point) {
        self.zoom = ZoomState::new(factor, center);
    }

    /// Render the live preview: the masked composite when regions exist,
    /// else the boundary crop, magnified per the current zoom. `None` when
    /// there is nothing to show yet.
    pub fn render_preview(&self, viewport: (u32, u32)) -> Option<RgbaImage> {
        if !self.regions.is_empty() {
            let mask = self.mask.as_ref()?;
            let base = region::apply_mask(&self.image, mask, self.invert);
            return Some(zoom::render_viewport(&base, &self.zoom, viewport));
        }
        let boundary = self.boundary()?;
        let base = self.image.crop(boundary);
        let local = self.crop_local_zoom(boundary);
        Some(zoom::render_viewport(&base, &local, viewport))
    }

    /// Map a pointer position in the preview back to image coordinates, for
    /// driving margin and region edits. `None` when nothing is shown.
    pub fn map_display_to_image(
        &self,
        display: (u32, u32),
        viewport: (u32, u32),
    ) -> Option<Point> {
        if !self.regions.is_empty() {
            let vp = self.zoom.viewport(self.image.dimensions(), viewport);
            return Some(vp.to_image(display));
        }
        let boundary = self.boundary()?;
        let local = self.crop_local_zoom(boundary);
        let vp = local.viewport((boundary.width(), boundary.height()), viewport);
        let p = vp.to_image(display);
        Some(Point::new(boundary.left + p.x, boundary.top + p.y))
    }

    /// The boundary preview renders a crop, so the zoom center (image
    /// coordinates) is translated into crop-local coordinates.
    fn crop_local_zoom(&self, boundary: Rect) -> ZoomState {
        let c = self.zoom.center();
        ZoomState::new(
            self.zoom.factor(),
            Point::new(
                c.x.saturating_sub(boundary.left),
                c.y.saturating_sub(boundary.top),
            ),
        )
    }

    // --- Export ------------------------------------------------------------

    /// Write the current extraction to `path`: the masked composite when
    /// regions exist, else the boundary crop.
    pub fn export(&self, format: ExportFormat, path: &Path) -> Result<ExportReport, SessionError> {
        let target = if !self.regions.is_empty() {
            let mask = self.mask.as_ref().ok_or(SessionError::NothingSelected)?;
            ExportTarget::Masked {
                mask,
                invert: self.invert,
            }
        } else {
            ExportTarget::Boundary(self.boundary().ok_or(SessionError::NothingSelected)?)
        };
        Ok(export::write(&self.image, target, format, path)?)
    }

    fn sized_selection(&self, a: Point, b: Point) -> Result<Rect, SessionError> {
        let (width, height) = self.image.dimensions();
        let rect = Rect::from_corners(a, b)
            .clamped_to(width, height)
            .ok_or(SessionError::SelectionTooSmall)?;
        if rect.width() < MIN_SELECTION || rect.height() < MIN_SELECTION {
            return Err(SessionError::SelectionTooSmall);
        }
        Ok(rect)
    }
}
