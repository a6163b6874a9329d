//! Final extraction and file output.
//!
//! Two export shapes, matching the two selection workflows:
//!
//! - **Boundary**: crop the image to the adjusted rectangle and encode it.
//! - **Masked**: copy kept pixels verbatim, paint the rest white, then crop
//!   to the minimal bounding box of the kept content; a full-canvas image
//!   padded with blank margin is never written.
//!
//! ## Encoding
//!
//! | Format | Alpha | Crate path |
//! |---|---|---|
//! | PNG | kept | `image` PNG encoder |
//! | TIFF | kept | `image` TIFF encoder |
//! | JPEG | flattened over white | `image` JPEG encoder |
//! | BMP | flattened over white | `image` BMP encoder |
//!
//! Every write goes to a temporary file in the destination directory and is
//! atomically persisted on success, so a failed export never leaves a
//! partial file behind.

use crate::buffer::ImageBuffer;
use crate::region::{Mask, apply_mask};
use crate::types::Rect;
use image::{ImageFormat, RgbImage, RgbaImage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("nothing to export: the kept set is empty")]
    EmptySelection,
}

/// Output formats the original tools write. PNG and TIFF carry alpha;
/// JPEG and BMP flatten over white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Png,
    Jpeg,
    Bmp,
    Tiff,
}

impl ExportFormat {
    /// Infer the format from a destination path's extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
        }
    }

    fn supports_alpha(self) -> bool {
        matches!(self, Self::Png | Self::Tiff)
    }
}

/// What to extract: the rectangular boundary, or the mask with its
/// keep-inside/keep-outside style.
#[derive(Debug, Clone, Copy)]
pub enum ExportTarget<'a> {
    Boundary(Rect),
    Masked { mask: &'a Mask, invert: bool },
}

/// What was written, for the shell's confirmation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Extract per `target` and write the result to `path`.
pub fn write(
    image: &ImageBuffer,
    target: ExportTarget<'_>,
    format: ExportFormat,
    path: &Path,
) -> Result<ExportReport, WriteError> {
    let raster = match target {
        ExportTarget::Boundary(rect) => image.crop(rect),
        ExportTarget::Masked { mask, invert } => {
            let bbox = mask.kept_bbox(invert).ok_or(WriteError::EmptySelection)?;
            let composited = apply_mask(image, mask, invert);
            image::imageops::crop_imm(&composited, bbox.left, bbox.top, bbox.width(), bbox.height())
                .to_image()
        }
    };

    let (width, height) = raster.dimensions();
    write_atomic(&raster, image.has_alpha(), format, path)?;
    debug!("export: wrote {width}x{height} {format:?} to {}", path.display());

    Ok(ExportReport {
        path: path.to_path_buf(),
        width,
        height,
    })
}

/// Encode into a temp file next to the destination, then atomically rename
/// into place.
fn write_atomic(
    raster: &RgbaImage,
    has_alpha: bool,
    format: ExportFormat,
    path: &Path,
) -> Result<(), WriteError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    encode(raster, has_alpha, format, tmp.as_file_mut())?;
    tmp.persist(path).map_err(|e| WriteError::Io(e.error))?;
    Ok(())
}

fn encode(
    raster: &RgbaImage,
    has_alpha: bool,
    format: ExportFormat,
    file: &mut std::fs::File,
) -> Result<(), WriteError> {
    let fmt = format.image_format();
    if has_alpha && format.supports_alpha() {
        raster
            .write_to(file, fmt)
            .map_err(|e| WriteError::Encode(e.to_string()))
    } else {
        // Alpha into an alpha-less encoder flattens over white instead of
        // failing; alpha-less sources drop their constant opaque channel.
        flatten_over_white(raster)
            .write_to(file, fmt)
            .map_err(|e| WriteError::Encode(e.to_string()))
    }
}

fn flatten_over_white(raster: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(raster.width(), raster.height(), |x, y| {
        let [r, g, b, a] = raster.get_pixel(x, y).0;
        let blend =
            |c: u8| ((c as u32 * a as u32 + 255 * (255 - a) as u32) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}
