//! Host-side commands driving the cover renderer.
//!
//! These play the part of the image-loading pipeline: they resolve the input
//! path, decide the file is a PDF, hand the bytes to the renderer and encode
//! the result. The renderer itself never touches the filesystem.

use crate::config::RendererConfig;
use crate::pdf::{self, CoverError, CoverLayout, CoverPageRenderer, PageSize};
use crate::screen::{ScreenSize, ScreenSource};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the command layer.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Input not found or not a PDF: {0}")]
    InvalidInput(String),

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Cover(#[from] CoverError),

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

impl CliError {
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, CliError::Cover(err) if err.is_out_of_memory())
    }
}

impl Serialize for CliError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Outcome of `render`.
#[derive(Debug, Serialize)]
pub struct RenderSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bpp: usize,
    pub png_bytes: usize,
}

/// Outcome of `info`.
#[derive(Debug, Serialize)]
pub struct CoverInfo {
    pub input: PathBuf,
    pub screen: ScreenSize,
    pub page_count: u32,
    pub page: PageSize,
    pub dpi: f64,
    pub width: u32,
    pub height: u32,
}

/// Check if a path is an existing file with a `.pdf` extension.
pub fn is_pdf_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
}

/// Check if a buffer carries a PDF header near its start.
///
/// Readers tolerate junk before the header, so the first 1024 bytes are searched.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}

/// Turn a command-line argument into a PDF path.
///
/// Accepts plain paths, `file://` URLs and percent-encoded paths.
pub fn resolve_input(arg: &str) -> Result<PathBuf, CliError> {
    let direct = PathBuf::from(arg);
    if is_pdf_file(&direct) {
        return Ok(direct);
    }

    // Handle file:// URLs (file managers sometimes pass these)
    if arg.starts_with("file://") {
        if let Some(path) = url::Url::parse(arg)
            .ok()
            .and_then(|url| url.to_file_path().ok())
        {
            if is_pdf_file(&path) {
                tracing::debug!("Resolved file URL {} to {:?}", arg, path);
                return Ok(path);
            }
        }
    }

    // Handle URL-encoded paths (e.g., spaces as %20)
    if let Ok(decoded) = urlencoding::decode(arg) {
        let decoded = PathBuf::from(decoded.into_owned());
        if decoded != direct && is_pdf_file(&decoded) {
            tracing::debug!("Resolved encoded path {} to {:?}", arg, decoded);
            return Ok(decoded);
        }
    }

    Err(CliError::InvalidInput(arg.to_string()))
}

/// Read a PDF from disk, rejecting files without a PDF header.
pub fn load_pdf_from_file(path: &Path) -> Result<Vec<u8>, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if !looks_like_pdf(&bytes) {
        return Err(CliError::InvalidInput(path.display().to_string()));
    }
    Ok(bytes)
}

/// `--screen` beats the config file; with neither, the host display is used.
fn screen_for(config: &RendererConfig, screen: Option<ScreenSize>) -> ScreenSource {
    ScreenSource::resolve(screen.or(config.screen), config.fallback_screen)
}

/// Render the cover of `input` and write it as a PNG.
///
/// Without `output`, the PNG lands next to the input with a `.png` extension.
pub fn render(
    input: &str,
    output: Option<&Path>,
    screen: Option<ScreenSize>,
    config: &RendererConfig,
) -> Result<RenderSummary, CliError> {
    let input = resolve_input(input)?;
    let bytes = load_pdf_from_file(&input)?;

    let context = pdf::shared_pdfium(config.pdfium_library.clone());
    let renderer =
        CoverPageRenderer::new(context, screen_for(config, screen)).with_limits(config.limits);
    let cover = renderer.render(&bytes)?;

    let (width, height, bpp) = (cover.width, cover.height, cover.bpp());
    let rgba = image::RgbaImage::from_raw(width, height, cover.into_rgba())
        .ok_or_else(|| CliError::Encode("pixel buffer does not match dimensions".to_string()))?;

    let mut png_bytes = Vec::new();
    image::DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| CliError::Encode(e.to_string()))?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("png"));
    std::fs::write(&output, &png_bytes).map_err(|source| CliError::Write {
        path: output.clone(),
        source,
    })?;

    tracing::info!("Wrote {}x{} cover to {:?}", width, height, output);

    Ok(RenderSummary {
        input,
        output,
        width,
        height,
        bpp,
        png_bytes: png_bytes.len(),
    })
}

/// Report the geometry the cover would be rendered at.
pub fn info(
    input: &str,
    screen: Option<ScreenSize>,
    config: &RendererConfig,
) -> Result<CoverInfo, CliError> {
    let input = resolve_input(input)?;
    let bytes = load_pdf_from_file(&input)?;

    let context = pdf::shared_pdfium(config.pdfium_library.clone());
    let renderer =
        CoverPageRenderer::new(context, screen_for(config, screen)).with_limits(config.limits);
    let CoverLayout {
        screen,
        page_count,
        page,
        dpi,
        width,
        height,
    } = renderer.layout(&bytes)?;

    Ok(CoverInfo {
        input,
        screen,
        page_count,
        page,
        dpi,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::ScreenMetrics;

    #[test]
    fn test_looks_like_pdf() {
        assert!(looks_like_pdf(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3"));
        assert!(looks_like_pdf(b"\xEF\xBB\xBF\r\n%PDF-1.7"));
        assert!(!looks_like_pdf(b"\x89PNG\r\n\x1a\n"));
        assert!(!looks_like_pdf(b""));
    }

    #[test]
    fn test_resolve_input_variants() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my cover.pdf");
        std::fs::write(&path, b"%PDF-1.7\n%%EOF").unwrap();
        let path_str = path.to_str().unwrap();

        assert_eq!(resolve_input(path_str).unwrap(), path);

        let url = url::Url::from_file_path(&path).unwrap();
        assert_eq!(resolve_input(url.as_str()).unwrap(), path);

        let encoded = path_str.replace(' ', "%20");
        assert_eq!(resolve_input(&encoded).unwrap(), path);
    }

    #[test]
    fn test_resolve_input_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("cover.png");
        std::fs::write(&png, b"\x89PNG").unwrap();

        assert!(matches!(
            resolve_input(png.to_str().unwrap()),
            Err(CliError::InvalidInput(_))
        ));
        assert!(resolve_input("/nonexistent/book.pdf").is_err());
    }

    #[test]
    fn test_load_rejects_mislabelled_file() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake.pdf");
        std::fs::write(&fake, b"PK\x03\x04 not a pdf").unwrap();

        assert!(matches!(
            load_pdf_from_file(&fake),
            Err(CliError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_screen_precedence() {
        let mut config = RendererConfig::default();
        let host = screen_for(&config, None);
        assert!(matches!(host, ScreenSource::Primary(_)));

        config.screen = Some(ScreenSize::new(1280, 1024));
        assert_eq!(
            screen_for(&config, None).primary_resolution(),
            ScreenSize::new(1280, 1024)
        );
        assert_eq!(
            screen_for(&config, Some(ScreenSize::new(640, 480))).primary_resolution(),
            ScreenSize::new(640, 480)
        );
    }

    #[test]
    fn test_out_of_memory_classification() {
        let oom = CliError::Cover(CoverError::OutOfMemory(pdf::OomCause::OutputAllocation));
        assert!(oom.is_out_of_memory());
        assert!(!CliError::Cover(CoverError::NoPages).is_out_of_memory());
    }
}
