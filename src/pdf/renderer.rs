//! Cover page renderer.
//!
//! Turns a PDF byte buffer into a tightly packed BGRA image of page 0, sized
//! to fit the primary display. The whole call runs under the engine lock;
//! document, page and bitmap are released in reverse order before it is
//! dropped, whichever way the call ends.

use crate::pdf::engine::{EngineContext, EngineError, RasterEngine};
use crate::pdf::raster::{
    compact_rows, optimal_dpi, target_dimensions, PageSize, RowCopyError, BYTES_PER_PIXEL,
};
use crate::screen::{ScreenMetrics, ScreenSize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The page rendered as the cover.
pub const COVER_PAGE_INDEX: u16 = 0;

/// Largest accepted width or height in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 65535;

/// Largest accepted `width * height`.
#[cfg(target_pointer_width = "64")]
pub const MAX_IMAGE_PIXELS: u64 = 1024 * 1024 * 1024;
#[cfg(not(target_pointer_width = "64"))]
pub const MAX_IMAGE_PIXELS: u64 = 1024 * 1024 * 300;

/// Safety ceilings on the rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLimits {
    pub max_dimension: u32,
    pub max_pixels: u64,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_IMAGE_DIMENSION,
            max_pixels: MAX_IMAGE_PIXELS,
        }
    }
}

/// Why a render ran out of memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OomCause {
    /// The computed image is larger than the pixel ceiling.
    PixelLimit { pixels: u64, max: u64 },
    /// The engine could not allocate its render target.
    BitmapAllocation,
    /// The output buffer could not be allocated.
    OutputAllocation,
}

/// Errors that can occur while rendering a cover.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoverError {
    #[error("Rendering engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Failed to load PDF: {0}")]
    LoadFailed(String),

    #[error("Document has no pages")]
    NoPages,

    #[error("Failed to load cover page: {0}")]
    PageLoadFailed(String),

    #[error("Cover page has no usable size")]
    InvalidPageSize,

    #[error("Cover would be {width}x{height} pixels, limit is {max} per side")]
    DimensionTooLarge { width: u32, height: u32, max: u32 },

    #[error("Out of memory: {0:?}")]
    OutOfMemory(OomCause),

    #[error("Rendering failed: {0}")]
    RenderFailed(String),
}

impl CoverError {
    /// Failures the caller may handle by skipping or downscaling rather than
    /// giving up on the file.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, CoverError::OutOfMemory(_))
    }
}

impl Serialize for CoverError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<EngineError> for CoverError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(reason) => CoverError::EngineUnavailable(reason),
            EngineError::Load(reason) => CoverError::LoadFailed(reason),
            EngineError::PageLoad { reason, .. } => CoverError::PageLoadFailed(reason),
            EngineError::Allocation { .. } => CoverError::OutOfMemory(OomCause::BitmapAllocation),
            EngineError::BufferAllocation { .. } => {
                CoverError::OutOfMemory(OomCause::OutputAllocation)
            }
            EngineError::Render(reason) => CoverError::RenderFailed(reason),
        }
    }
}

impl From<RowCopyError> for CoverError {
    fn from(err: RowCopyError) -> Self {
        CoverError::RenderFailed(err.to_string())
    }
}

/// A rendered cover: tightly packed BGRA rows, `width * 4` bytes each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CoverImage {
    /// Bytes per pixel. Always 4.
    pub fn bpp(&self) -> usize {
        BYTES_PER_PIXEL
    }

    /// Pixel data reordered to RGBA for encoders that expect it.
    pub fn into_rgba(mut self) -> Vec<u8> {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        self.pixels
    }
}

/// Result of [`CoverPageRenderer::read_image`], as the image loader sees it.
#[derive(Debug)]
pub enum ReadOutcome {
    Image(CoverImage),
    OutOfMemory,
    Failed(CoverError),
}

impl From<Result<CoverImage, CoverError>> for ReadOutcome {
    fn from(result: Result<CoverImage, CoverError>) -> Self {
        match result {
            Ok(image) => ReadOutcome::Image(image),
            Err(err) if err.is_out_of_memory() => ReadOutcome::OutOfMemory,
            Err(err) => ReadOutcome::Failed(err),
        }
    }
}

/// Geometry chosen for a cover, before any bitmap exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverLayout {
    /// Display resolution the page was fitted to.
    pub screen: ScreenSize,
    pub page_count: u32,
    pub page: PageSize,
    pub dpi: f64,
    pub width: u32,
    pub height: u32,
}

/// Renders PDF cover pages through a shared engine context.
pub struct CoverPageRenderer<'c, E, S> {
    context: &'c EngineContext<E>,
    screen: S,
    limits: RenderLimits,
}

impl<'c, E: RasterEngine, S: ScreenMetrics> CoverPageRenderer<'c, E, S> {
    pub fn new(context: &'c EngineContext<E>, screen: S) -> Self {
        Self {
            context,
            screen,
            limits: RenderLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: RenderLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> RenderLimits {
        self.limits
    }

    /// Render page 0 of `bytes` into a fresh BGRA buffer.
    pub fn render(&self, bytes: &[u8]) -> Result<CoverImage, CoverError> {
        let engine = self.context.acquire()?;

        let document = engine.load_document(bytes)?;
        if document.page_count() < 1 {
            return Err(CoverError::NoPages);
        }

        let page = document.load_page(COVER_PAGE_INDEX)?;
        let layout = self.layout_for(page.size(), document.page_count())?;
        self.check_limits(&layout)?;

        let mut bitmap = page.render(layout.width, layout.height)?;
        let stride = bitmap.stride();
        let buffer = bitmap
            .take_buffer()
            .ok_or_else(|| CoverError::RenderFailed("engine returned no pixel buffer".to_string()))?;
        let pixels = compact_rows(buffer, stride, layout.width, layout.height)?;

        tracing::debug!(
            "Rendered cover {}x{} at {:.1} DPI for {} (stride {})",
            layout.width,
            layout.height,
            layout.dpi,
            layout.screen,
            stride
        );

        Ok(CoverImage {
            pixels,
            width: layout.width,
            height: layout.height,
        })
    }

    /// Render and fold the result into the loader-facing outcome.
    pub fn read_image(&self, bytes: &[u8]) -> ReadOutcome {
        let result = self.render(bytes);
        if let Err(err) = &result {
            tracing::warn!("Cover render failed: {}", err);
        }
        result.into()
    }

    /// Work out the cover geometry without rendering anything.
    pub fn layout(&self, bytes: &[u8]) -> Result<CoverLayout, CoverError> {
        let engine = self.context.acquire()?;
        let document = engine.load_document(bytes)?;
        if document.page_count() < 1 {
            return Err(CoverError::NoPages);
        }
        let page = document.load_page(COVER_PAGE_INDEX)?;
        self.layout_for(page.size(), document.page_count())
    }

    fn layout_for(&self, page: PageSize, page_count: u32) -> Result<CoverLayout, CoverError> {
        if !page.is_renderable() {
            return Err(CoverError::InvalidPageSize);
        }
        let screen = self.screen.primary_resolution();
        let dpi = optimal_dpi(page, screen);
        let (width, height) = target_dimensions(page, dpi);
        if width == 0 || height == 0 {
            return Err(CoverError::InvalidPageSize);
        }
        Ok(CoverLayout {
            screen,
            page_count,
            page,
            dpi,
            width,
            height,
        })
    }

    fn check_limits(&self, layout: &CoverLayout) -> Result<(), CoverError> {
        let max = self.limits.max_dimension;
        if layout.width > max || layout.height > max {
            return Err(CoverError::DimensionTooLarge {
                width: layout.width,
                height: layout.height,
                max,
            });
        }
        let pixels = u64::from(layout.width) * u64::from(layout.height);
        if pixels > self.limits.max_pixels {
            return Err(CoverError::OutOfMemory(OomCause::PixelLimit {
                pixels,
                max: self.limits.max_pixels,
            }));
        }
        Ok(())
    }
}
