//! Resolution math and row compaction for cover rendering.
//!
//! Page geometry arrives in PDF points (1/72 inch). The target resolution is
//! the largest DPI at which the whole page still fits on the primary display,
//! floored at 72 DPI. There is no upper bound here; the caller's size limits
//! are what keep tiny pages on huge screens in check.

use crate::screen::ScreenSize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output pixels are always BGRA.
pub const BYTES_PER_PIXEL: usize = 4;

/// PDF user space unit: 1 point = 1/72 inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Floor applied to the computed resolution.
pub const MIN_DPI: f64 = 72.0;

/// Page size in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both sides are finite and strictly positive.
    pub fn is_renderable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn width_inches(&self) -> f64 {
        self.width / POINTS_PER_INCH
    }

    pub fn height_inches(&self) -> f64 {
        self.height / POINTS_PER_INCH
    }
}

/// DPI at which `page` fits within `screen`, never below [`MIN_DPI`].
pub fn optimal_dpi(page: PageSize, screen: ScreenSize) -> f64 {
    let dpi_x = f64::from(screen.width) / page.width_inches();
    let dpi_y = f64::from(screen.height) / page.height_inches();
    dpi_x.min(dpi_y).max(MIN_DPI)
}

/// Pixel dimensions of `page` rendered at `dpi`, truncated toward zero.
///
/// Values beyond `u32::MAX` saturate, so oversize pages are still caught by
/// the dimension limit rather than wrapping.
pub fn target_dimensions(page: PageSize, dpi: f64) -> (u32, u32) {
    let width = (page.width_inches() * dpi) as u32;
    let height = (page.height_inches() * dpi) as u32;
    (width, height)
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RowCopyError {
    #[error("Stride {stride} is shorter than a {row_bytes}-byte row")]
    StrideTooShort { stride: usize, row_bytes: usize },

    #[error("Source buffer holds {actual} bytes but {required} are needed")]
    SourceTooShort { required: usize, actual: usize },
}

/// Pack `height` rows of `width` BGRA pixels held in a strided buffer,
/// reusing the buffer's own memory.
///
/// Row `y` moves from `y * stride` to `y * width * 4`; padding past each row
/// is overwritten and the tail truncated. Nothing is allocated, so a buffer
/// the engine managed to hand over can always be returned.
pub fn compact_rows(
    mut pixels: Vec<u8>,
    stride: usize,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RowCopyError> {
    let row_bytes = width as usize * BYTES_PER_PIXEL;
    if stride < row_bytes {
        return Err(RowCopyError::StrideTooShort { stride, row_bytes });
    }

    let rows = height as usize;
    let required = match rows {
        0 => 0,
        n => stride
            .checked_mul(n - 1)
            .and_then(|bytes| bytes.checked_add(row_bytes))
            .unwrap_or(usize::MAX),
    };
    if pixels.len() < required {
        return Err(RowCopyError::SourceTooShort {
            required,
            actual: pixels.len(),
        });
    }

    // Destination never runs ahead of the source, so rows move front to back
    if stride != row_bytes {
        for y in 1..rows {
            let from = y * stride;
            pixels.copy_within(from..from + row_bytes, y * row_bytes);
        }
    }
    pixels.truncate(row_bytes * rows);

    Ok(pixels)
}
