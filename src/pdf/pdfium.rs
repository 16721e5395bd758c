//! PDFium backend built on pdfium-render.
//!
//! Note: `Pdfium` initializes the native library when created and destroys it
//! when dropped, so an engine is only ever built for the process-wide context
//! returned by [`shared_pdfium`](crate::pdf::shared_pdfium). That context is
//! never dropped and its lock keeps calls serialized.

use crate::pdf::engine::{EngineBitmap, EngineDocument, EngineError, EnginePage, RasterEngine};
use crate::pdf::raster::{PageSize, BYTES_PER_PIXEL};
use pdfium_render::prelude::*;
use std::path::Path;

/// Environment variable naming an explicit PDFium library to bind.
pub const PDFIUM_LIBRARY_ENV: &str = "COVER_RENDER_PDFIUM";

/// PDFium bound to a native library.
///
/// Only the crate can build one; hosts reach it through `shared_pdfium`:
///
/// ```compile_fail
/// let _ = cover_render_lib::pdf::PdfiumEngine::bind(None);
/// ```
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    /// Bind to PDFium, trying each location in turn.
    ///
    /// Order: `library_path` if given, the library bundled next to the
    /// executable, the system library, then the platform name in the working
    /// directory.
    pub(crate) fn bind(library_path: Option<&Path>) -> Result<Self, EngineError> {
        // Strategy 1: explicitly configured library
        if let Some(path) = library_path {
            match Pdfium::bind_to_library(path) {
                Ok(bindings) => {
                    tracing::info!("Loaded configured PDFium library: {:?}", path);
                    return Ok(Self::new(bindings));
                }
                Err(e) => {
                    tracing::warn!("Failed configured PDFium library {:?}: {:?}", path, e);
                }
            }
        }

        // Strategy 2: library bundled with the executable
        if let Some(bundled) = bundled_library_path() {
            if bundled.exists() {
                match Pdfium::bind_to_library(&bundled) {
                    Ok(bindings) => {
                        tracing::info!("Loaded bundled PDFium library: {:?}", bundled);
                        return Ok(Self::new(bindings));
                    }
                    Err(e) => {
                        tracing::warn!("Failed bundled PDFium library {:?}: {:?}", bundled, e);
                    }
                }
            }
        }

        // Strategy 3: system library
        if let Ok(bindings) = Pdfium::bind_to_system_library() {
            tracing::info!("Loaded system PDFium library");
            return Ok(Self::new(bindings));
        }

        // Strategy 4: platform library name in the working directory
        let local = Pdfium::pdfium_platform_library_name_at_path("./");
        if let Ok(bindings) = Pdfium::bind_to_library(&local) {
            tracing::info!("Loaded PDFium library from working directory: {:?}", local);
            return Ok(Self::new(bindings));
        }

        Err(EngineError::Unavailable(format!(
            "Could not load the PDFium library. Set {} or place {:?} next to the executable.",
            PDFIUM_LIBRARY_ENV,
            Pdfium::pdfium_platform_library_name()
        )))
    }

    /// Bind using `configured`, falling back to the environment override.
    pub(crate) fn bind_with_env(configured: Option<&Path>) -> Result<Self, EngineError> {
        let from_env = std::env::var_os(PDFIUM_LIBRARY_ENV).map(std::path::PathBuf::from);
        Self::bind(configured.or(from_env.as_deref()))
    }

    fn new(bindings: Box<dyn PdfiumLibraryBindings>) -> Self {
        Self {
            pdfium: Pdfium::new(bindings),
        }
    }
}

/// Where an app bundle keeps its private copy of the library.
fn bundled_library_path() -> Option<std::path::PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let exe_dir = exe_path.parent()?;

    if cfg!(target_os = "macos") {
        // Contents/MacOS/<exe> -> Contents/Frameworks/libpdfium.dylib
        exe_dir
            .join("..")
            .join("Frameworks")
            .join(Pdfium::pdfium_platform_library_name())
            .canonicalize()
            .ok()
    } else {
        Some(exe_dir.join(Pdfium::pdfium_platform_library_name()))
    }
}

impl RasterEngine for PdfiumEngine {
    fn load_document<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Box<dyn EngineDocument + 'a>, EngineError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| EngineError::Load(e.to_string()))?;

        Ok(Box::new(PdfiumDocument {
            document,
            bindings: self.pdfium.bindings(),
        }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    bindings: &'a dyn PdfiumLibraryBindings,
}

impl EngineDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> u32 {
        self.document.pages().len() as u32
    }

    fn load_page(&self, index: u16) -> Result<Box<dyn EnginePage + '_>, EngineError> {
        let page = self
            .document
            .pages()
            .get(index)
            .map_err(|e| EngineError::PageLoad {
                index,
                reason: e.to_string(),
            })?;

        Ok(Box::new(PdfiumPage {
            page,
            bindings: self.bindings,
        }))
    }
}

struct PdfiumPage<'a> {
    page: PdfPage<'a>,
    bindings: &'a dyn PdfiumLibraryBindings,
}

impl EnginePage for PdfiumPage<'_> {
    fn size(&self) -> PageSize {
        PageSize::new(
            f64::from(self.page.width().value),
            f64::from(self.page.height().value),
        )
    }

    fn render(&self, width: u32, height: u32) -> Result<Box<dyn EngineBitmap + '_>, EngineError> {
        let allocation_error = |reason: String| EngineError::Allocation {
            width,
            height,
            reason,
        };
        let pixel_width = Pixels::try_from(width).map_err(|e| allocation_error(e.to_string()))?;
        let pixel_height = Pixels::try_from(height).map_err(|e| allocation_error(e.to_string()))?;

        let mut bitmap = PdfBitmap::empty(
            pixel_width,
            pixel_height,
            PdfBitmapFormat::BGRA,
            self.bindings,
        )
        .map_err(|e| allocation_error(e.to_string()))?;

        // White background so transparent regions don't come out black;
        // annotations on, interactive form fields off
        let config = PdfRenderConfig::new()
            .set_target_size(pixel_width, pixel_height)
            .set_clear_color(PdfColor::WHITE)
            .render_annotations(true)
            .render_form_data(false)
            .use_lcd_text_rendering(true);

        self.page
            .render_into_bitmap_with_config(&mut bitmap, &config)
            .map_err(|e| EngineError::Render(e.to_string()))?;

        // PDFium allocated the target itself, so its BGRA rows are exactly
        // width * 4 bytes and length / height recovers the stride.
        let bytes = (width as usize * BYTES_PER_PIXEL)
            .checked_mul(height as usize)
            .ok_or(EngineError::BufferAllocation { bytes: usize::MAX })?;

        // as_raw_bytes() copies with an infallible allocation; make sure that
        // much memory is there first so exhaustion is reported, not fatal
        let mut reservation: Vec<u8> = Vec::new();
        reservation
            .try_reserve_exact(bytes)
            .map_err(|_| EngineError::BufferAllocation { bytes })?;
        drop(reservation);

        let pixels: Vec<u8> = bitmap.as_raw_bytes();
        let stride = match height {
            0 => 0,
            rows => pixels.len() / rows as usize,
        };

        Ok(Box::new(PdfiumBitmap {
            _bitmap: bitmap,
            pixels: Some(pixels),
            stride,
        }))
    }
}

struct PdfiumBitmap<'a> {
    // Held so the native bitmap is destroyed with the other handles, in order
    _bitmap: PdfBitmap<'a>,
    pixels: Option<Vec<u8>>,
    stride: usize,
}

impl EngineBitmap for PdfiumBitmap<'_> {
    fn stride(&self) -> usize {
        self.stride
    }

    fn take_buffer(&mut self) -> Option<Vec<u8>> {
        self.pixels.take().filter(|pixels| !pixels.is_empty())
    }
}
