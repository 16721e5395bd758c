//! Renderer configuration, read from a JSON file.
//!
//! Every field is optional; missing ones take the built-in defaults.

use crate::pdf::RenderLimits;
use crate::screen::ScreenSize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Size ceilings applied before any bitmap is allocated.
    pub limits: RenderLimits,
    /// Fixed display resolution; unset means ask the host on every render.
    pub screen: Option<ScreenSize>,
    /// Used when the host reports no display.
    pub fallback_screen: ScreenSize,
    /// Explicit PDFium library; otherwise bundled/system lookup applies.
    pub pdfium_library: Option<PathBuf>,
}

impl RendererConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
