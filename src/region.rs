//! User-drawn regions and the binary mask composed from them.
//!
//! A [`Region`] is a rectangle or a closed freehand polygon in image
//! coordinates, tagged additive. The [`Mask`] is always exactly the union of
//! the current ordered region list: any add or remove triggers a full
//! [`compose`] from scratch, never an incremental patch. That makes the mask
//! a pure function of the list, which is what undo/redo in a shell relies
//! on.
//!
//! Polygons are rasterized with a scanline fill under the nonzero winding
//! rule, sampling at pixel centers. Freehand shapes are simple by
//! construction (multi-click gestures); malformed input is rejected before
//! it ever reaches the list.

use crate::buffer::ImageBuffer;
use crate::types::{Point, Rect};
use image::{Rgba, RgbaImage};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Background painted over pixels that are not kept.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolygonError {
    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("polygon edges cross each other")]
    SelfIntersecting,
}

/// Opaque identity of a region within a session. Removal is by id, so a
/// shell can offer per-region deletion regardless of list position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(u64);

impl RegionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionShape {
    Rectangle(Rect),
    /// Closed polygon; the edge from the last vertex back to the first is
    /// implicit.
    Polygon(Vec<Point>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    id: RegionId,
    shape: RegionShape,
}

impl Region {
    pub fn rectangle(id: RegionId, rect: Rect) -> Self {
        Self {
            id,
            shape: RegionShape::Rectangle(rect),
        }
    }

    /// Build a freehand region. Validates before construction so an invalid
    /// gesture never produces a `Region` value at all.
    pub fn polygon(id: RegionId, vertices: Vec<Point>) -> Result<Self, PolygonError> {
        validate_polygon(&vertices)?;
        Ok(Self {
            id,
            shape: RegionShape::Polygon(vertices),
        })
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn shape(&self) -> &RegionShape {
        &self.shape
    }
}

/// Reject polygons with fewer than 3 vertices or with properly crossing
/// non-adjacent edges. Collinear touching is left alone: multi-click
/// gestures produce it legitimately (doubled clicks, straight runs).
pub fn validate_polygon(vertices: &[Point]) -> Result<(), PolygonError> {
    let n = vertices.len();
    if n < 3 {
        return Err(PolygonError::TooFewVertices(n));
    }

    let edge = |i: usize| (vertices[i], vertices[(i + 1) % n]);
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (a, b) = edge(i);
            let (c, d) = edge(j);
            if segments_cross(a, b, c, d) {
                return Err(PolygonError::SelfIntersecting);
            }
        }
    }
    Ok(())
}

/// Cross product of `(b − a) × (c − a)`.
fn orient(a: Point, b: Point, c: Point) -> i64 {
    let (ax, ay) = (a.x as i64, a.y as i64);
    let (bx, by) = (b.x as i64, b.y as i64);
    let (cx, cy) = (c.x as i64, c.y as i64);
    (bx - ax) * (cy - ay) - (by - ay) * (cx - ax)
}

/// Proper crossing test: each segment's endpoints lie strictly on opposite
/// sides of the other segment's line.
fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);
    ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0))
}

/// Binary raster with the same dimensions as the image: 255 = covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn covered(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize] != 0
    }

    pub fn covered_count(&self) -> usize {
        self.data.iter().filter(|&&b| b != 0).count()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Minimal bounding box of the kept set: the covered pixels, or their
    /// complement when `invert` selects keep-outside.
    pub fn kept_bbox(&self, invert: bool) -> Option<Rect> {
        let mut bbox: Option<(u32, u32, u32, u32)> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.covered(x, y) != invert {
                    bbox = Some(match bbox {
                        None => (x, y, x, y),
                        Some((l, t, r, b)) => (l.min(x), t.min(y), r.max(x), b.max(y)),
                    });
                }
            }
        }
        bbox.map(|(l, t, r, b)| Rect {
            left: l,
            top: t,
            right: r + 1,
            bottom: b + 1,
        })
    }
}

/// Rasterize the union of `regions` into a fresh mask.
///
/// Deterministic function of the ordered region list; rows are filled in
/// parallel, each row visiting every region.
pub fn compose(regions: &[Region], width: u32, height: u32) -> Mask {
    let mut data = vec![0u8; width as usize * height as usize];
    data.par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for region in regions {
                fill_row(region.shape(), y as u32, row);
            }
        });
    debug!("compose: {} regions over {}x{}", regions.len(), width, height);
    Mask {
        width,
        height,
        data,
    }
}

fn fill_row(shape: &RegionShape, y: u32, row: &mut [u8]) {
    match shape {
        RegionShape::Rectangle(rect) => {
            if y >= rect.top && y < rect.bottom {
                let left = (rect.left as usize).min(row.len());
                let right = (rect.right as usize).min(row.len());
                row[left..right].fill(255);
            }
        }
        RegionShape::Polygon(vertices) => fill_polygon_row(vertices, y, row),
    }
}

/// Scanline fill at the pixel-center line `y + 0.5` under the nonzero
/// winding rule. Down-going edges count +1, up-going −1; spans with a
/// nonzero running total are inside.
fn fill_polygon_row(vertices: &[Point], y: u32, row: &mut [u8]) {
    let sample = y as f64 + 0.5;
    let n = vertices.len();

    let mut crossings: Vec<(f64, i32)> = Vec::new();
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let (ay, by) = (a.y as f64, b.y as f64);
        if ay == by {
            continue;
        }
        let (downward, upward) = (ay <= sample && by > sample, by <= sample && ay > sample);
        if downward || upward {
            let t = (sample - ay) / (by - ay);
            let x = a.x as f64 + t * (b.x as f64 - a.x as f64);
            crossings.push((x, if downward { 1 } else { -1 }));
        }
    }
    crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut winding = 0i32;
    let mut span_start = 0.0f64;
    for (x, dir) in crossings {
        if winding != 0 {
            fill_span(row, span_start, x);
        }
        winding += dir;
        span_start = x;
    }
}

/// Mark pixels whose center lies in `[from, to)`.
fn fill_span(row: &mut [u8], from: f64, to: f64) {
    let first = (from - 0.5).ceil().max(0.0) as usize;
    let end = ((to - 0.5).ceil().max(0.0) as usize).min(row.len());
    if first < end {
        row[first..end].fill(255);
    }
}

/// Copy the kept pixels verbatim and paint everything else with the white
/// background. `invert` selects keep-outside instead of keep-inside; it is
/// applied here, never baked into the mask, so toggling the style never
/// requires redrawing shapes.
pub fn apply_mask(image: &ImageBuffer, mask: &Mask, invert: bool) -> RgbaImage {
    let (width, height) = image.dimensions();
    debug_assert_eq!((mask.width(), mask.height()), (width, height));

    let mut out = RgbaImage::from_pixel(width, height, BACKGROUND);
    let src = image.pixels().as_raw();
    let stride = width as usize * 4;

    let buf: &mut [u8] = &mut out;
    buf.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for x in 0..width as usize {
            if mask.covered(x as u32, y as u32) != invert {
                let offset = y * stride + x * 4;
                row[x * 4..x * 4 + 4].copy_from_slice(&src[offset..offset + 4]);
            }
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::canvas_fn;

    fn rect(left: u32, top: u32, right: u32, bottom: u32) -> Rect {
        Rect {
            left,
            top,
            right,
            bottom,
        }
    }

    fn id(raw: u64) -> RegionId {
        RegionId::new(raw)
    }

    fn points(coords: &[(u32, u32)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn rectangle_fill_covers_exact_area() {
        let mask = compose(&[Region::rectangle(id(1), rect(10, 10, 20, 20))], 50, 50);
        assert_eq!(mask.covered_count(), 100);
        assert!(mask.covered(10, 10));
        assert!(mask.covered(19, 19));
        assert!(!mask.covered(20, 19));
    }

    #[test]
    fn square_polygon_matches_rectangle_fill() {
        let square = Region::polygon(id(1), points(&[(10, 10), (20, 10), (20, 20), (10, 20)]))
            .unwrap();
        let poly_mask = compose(&[square], 50, 50);
        let rect_mask = compose(&[Region::rectangle(id(2), rect(10, 10, 20, 20))], 50, 50);
        assert_eq!(poly_mask.as_bytes(), rect_mask.as_bytes());
    }

    #[test]
    fn triangle_fill_counts_center_samples() {
        let triangle = Region::polygon(id(1), points(&[(0, 0), (10, 0), (0, 10)])).unwrap();
        let mask = compose(&[triangle], 20, 20);
        // Row y covers centers x+0.5 < 10-(y+0.5): 9 + 8 + ... + 1 + 0.
        assert_eq!(mask.covered_count(), 45);
    }

    #[test]
    fn union_is_monotonic() {
        let first = Region::rectangle(id(1), rect(5, 5, 15, 15));
        let second = Region::polygon(id(2), points(&[(10, 10), (30, 12), (20, 30)])).unwrap();

        let before = compose(std::slice::from_ref(&first), 40, 40);
        let after = compose(&[first, second], 40, 40);

        for y in 0..40 {
            for x in 0..40 {
                if before.covered(x, y) {
                    assert!(after.covered(x, y), "({x},{y}) uncovered by adding a region");
                }
            }
        }
        assert!(after.covered_count() > before.covered_count());
    }

    #[test]
    fn recompose_of_identical_list_is_identical() {
        let build = || {
            vec![
                Region::rectangle(id(1), rect(2, 2, 8, 8)),
                Region::polygon(id(2), points(&[(5, 5), (15, 6), (9, 14)])).unwrap(),
            ]
        };
        let a = compose(&build(), 20, 20);
        let b = compose(&build(), 20, 20);
        assert_eq!(a, b);
    }

    #[test]
    fn too_few_vertices_rejected() {
        let err = Region::polygon(id(1), points(&[(0, 0), (5, 5)])).unwrap_err();
        assert_eq!(err, PolygonError::TooFewVertices(2));
    }

    #[test]
    fn bowtie_rejected() {
        let err =
            Region::polygon(id(1), points(&[(0, 0), (10, 10), (10, 0), (0, 10)])).unwrap_err();
        assert_eq!(err, PolygonError::SelfIntersecting);
    }

    #[test]
    fn convex_polygon_accepted() {
        let pentagon = points(&[(10, 0), (20, 7), (16, 19), (4, 19), (0, 7)]);
        assert!(validate_polygon(&pentagon).is_ok());
    }

    #[test]
    fn kept_bbox_tracks_covered_content() {
        let mask = compose(&[Region::rectangle(id(1), rect(3, 7, 9, 12))], 30, 30);
        assert_eq!(mask.kept_bbox(false), Some(rect(3, 7, 9, 12)));
        // Keep-outside content spans the whole canvas.
        assert_eq!(mask.kept_bbox(true), Some(rect(0, 0, 30, 30)));
    }

    #[test]
    fn empty_mask_has_no_bbox() {
        let mask = compose(&[], 10, 10);
        assert_eq!(mask.kept_bbox(false), None);
        assert_eq!(mask.kept_bbox(true), Some(rect(0, 0, 10, 10)));
    }

    #[test]
    fn apply_mask_keeps_inside_and_paints_outside() {
        let image = canvas_fn(10, 10, |_, _| [10, 20, 30]);
        let mask = compose(&[Region::rectangle(id(1), rect(2, 2, 5, 5))], 10, 10);

        let kept_inside = apply_mask(&image, &mask, false);
        assert_eq!(kept_inside.get_pixel(3, 3).0, [10, 20, 30, 255]);
        assert_eq!(kept_inside.get_pixel(0, 0).0, [255, 255, 255, 255]);

        let kept_outside = apply_mask(&image, &mask, true);
        assert_eq!(kept_outside.get_pixel(3, 3).0, [255, 255, 255, 255]);
        assert_eq!(kept_outside.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }
}
