//! Display resolution used to size rendered covers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pixel resolution of a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid screen size '{0}', expected WIDTHxHEIGHT")]
pub struct ParseScreenSizeError(String);

impl FromStr for ScreenSize {
    type Err = ParseScreenSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseScreenSizeError(s.to_string());
        let (w, h) = s
            .trim()
            .split_once(|c| c == 'x' || c == 'X')
            .ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self::new(width, height))
    }
}

/// Source of the primary display's resolution.
///
/// Queried once per render call, so implementations may track monitor changes.
pub trait ScreenMetrics {
    fn primary_resolution(&self) -> ScreenSize;
}

/// A display whose resolution is known up front (configuration, CLI, tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedScreen(pub ScreenSize);

impl ScreenMetrics for FixedScreen {
    fn primary_resolution(&self) -> ScreenSize {
        self.0
    }
}

impl<T: ScreenMetrics + ?Sized> ScreenMetrics for &T {
    fn primary_resolution(&self) -> ScreenSize {
        (**self).primary_resolution()
    }
}

/// The host's primary display, asked for its resolution on every call.
///
/// Falls back to `fallback` when the platform has no display to report
/// (headless sessions, platforms without a query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrimaryDisplay {
    fallback: ScreenSize,
}

impl PrimaryDisplay {
    pub const fn with_fallback(fallback: ScreenSize) -> Self {
        Self { fallback }
    }

    pub fn fallback(&self) -> ScreenSize {
        self.fallback
    }

    /// Resolution reported by the host, if any.
    pub fn query() -> Option<ScreenSize> {
        host::primary_resolution().filter(|size| size.width > 0 && size.height > 0)
    }
}

impl ScreenMetrics for PrimaryDisplay {
    fn primary_resolution(&self) -> ScreenSize {
        match Self::query() {
            Some(size) => size,
            None => {
                tracing::debug!("No primary display found, using {}", self.fallback);
                self.fallback
            }
        }
    }
}

/// Where a command takes its screen size from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenSource {
    /// A size given explicitly, used as is.
    Fixed(FixedScreen),
    /// Whatever the host reports at render time.
    Primary(PrimaryDisplay),
}

impl ScreenSource {
    /// An explicit size wins; otherwise the host display with `fallback`.
    pub fn resolve(explicit: Option<ScreenSize>, fallback: ScreenSize) -> Self {
        match explicit {
            Some(size) => ScreenSource::Fixed(FixedScreen(size)),
            None => ScreenSource::Primary(PrimaryDisplay::with_fallback(fallback)),
        }
    }
}

impl ScreenMetrics for ScreenSource {
    fn primary_resolution(&self) -> ScreenSize {
        match self {
            ScreenSource::Fixed(screen) => screen.primary_resolution(),
            ScreenSource::Primary(display) => display.primary_resolution(),
        }
    }
}

#[cfg(windows)]
mod host {
    use super::ScreenSize;
    use windows_sys::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    pub fn primary_resolution() -> Option<ScreenSize> {
        // SAFETY: GetSystemMetrics has no preconditions and returns 0 on failure
        let (width, height) =
            unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        Some(ScreenSize::new(u32::try_from(width).ok()?, u32::try_from(height).ok()?))
    }
}

#[cfg(target_os = "macos")]
mod host {
    use super::ScreenSize;
    use display_info::DisplayInfo;

    pub fn primary_resolution() -> Option<ScreenSize> {
        let displays = match DisplayInfo::all() {
            Ok(displays) => displays,
            Err(e) => {
                tracing::warn!("Failed to list displays: {}", e);
                return None;
            }
        };
        displays
            .iter()
            .find(|display| display.is_primary)
            .or_else(|| displays.first())
            .map(|display| ScreenSize::new(display.width, display.height))
    }
}

#[cfg(not(any(windows, target_os = "macos")))]
mod host {
    use super::ScreenSize;

    pub fn primary_resolution() -> Option<ScreenSize> {
        None
    }
}
