//! PDF cover rendering through PDFium.
//!
//! This module provides:
//! - A lock-guarded, lazily initialized engine context
//! - Screen-fitted resolution selection for page 0
//! - In-place stride compaction into packed BGRA buffers

mod engine;
#[cfg(test)]
mod mock;
mod pdfium;
mod raster;
mod renderer;

pub use engine::*;
pub use pdfium::*;
pub use raster::*;
pub use renderer::*;

use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

struct SharedPdfium {
    library: Option<PathBuf>,
    context: EngineContext<PdfiumEngine>,
}

static SHARED_PDFIUM: OnceCell<SharedPdfium> = OnceCell::new();

/// Process-wide PDFium context, created on first use and never torn down.
///
/// `library` is only consulted by the first caller; later calls share the
/// context it created. A later call naming a different library is logged and
/// otherwise ignored.
pub fn shared_pdfium(library: Option<PathBuf>) -> &'static EngineContext<PdfiumEngine> {
    let mut requested = library.clone();
    let shared = SHARED_PDFIUM.get_or_init(|| {
        requested = None;
        let first = library.clone();
        SharedPdfium {
            library: library.clone(),
            context: EngineContext::new(move || PdfiumEngine::bind_with_env(first.as_deref())),
        }
    });

    if library_mismatch(shared.library.as_deref(), requested.as_deref()) {
        tracing::warn!(
            "PDFium already set up with {:?}; ignoring requested library {:?}",
            shared.library,
            requested
        );
    }
    &shared.context
}

/// Whether `requested` asks for something other than what the shared context
/// was created with.
fn library_mismatch(first: Option<&Path>, requested: Option<&Path>) -> bool {
    match requested {
        Some(path) => first != Some(path),
        None => false,
    }
}
