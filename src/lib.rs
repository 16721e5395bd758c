// Cover Render - PDF cover pages for image viewers
//
// This crate renders page 0 of a PDF into a packed BGRA buffer sized to the
// primary display, serialized through a single PDFium context.

mod cli;
pub mod commands;
pub mod config;
pub mod pdf;
pub mod screen;

pub use cli::run;
pub use pdf::{
    CoverError, CoverImage, CoverPageRenderer, EngineContext, OomCause, ReadOutcome, RenderLimits,
};
pub use screen::{FixedScreen, PrimaryDisplay, ScreenMetrics, ScreenSize, ScreenSource};

/// Render the cover of `bytes` with the process-wide PDFium context and the
/// default size limits, fitted to the host's primary display.
///
/// This is the entry point the image loader calls once it has decided a
/// buffer is a PDF.
pub fn read_image(bytes: &[u8]) -> ReadOutcome {
    read_image_with_screen(bytes, PrimaryDisplay::default())
}

/// Like [`read_image`], with the display resolution taken from `screen`.
pub fn read_image_with_screen<S: ScreenMetrics>(bytes: &[u8], screen: S) -> ReadOutcome {
    CoverPageRenderer::new(pdf::shared_pdfium(None), screen).read_image(bytes)
}
