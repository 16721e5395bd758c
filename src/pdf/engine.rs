//! Seam between the cover renderer and the native rasterizer.
//!
//! The rasterizer is not reentrant anywhere in its API, so every call into it
//! happens while holding the lock owned by an [`EngineContext`]. Handles are
//! boxed trait objects whose lifetimes nest: a bitmap borrows its page, a page
//! borrows its document, and a document borrows the engine behind the guard.
//! Dropping them in reverse order releases the native resources on every path.

use crate::pdf::raster::PageSize;
use serde::Serialize;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors reported by a rendering engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Rendering engine unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to load document: {0}")]
    Load(String),

    #[error("Failed to load page {index}: {reason}")]
    PageLoad { index: u16, reason: String },

    #[error("Failed to allocate a {width}x{height} render target: {reason}")]
    Allocation {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("Failed to allocate {bytes} bytes for the pixel buffer")]
    BufferAllocation { bytes: usize },

    #[error("Rendering failed: {0}")]
    Render(String),
}

impl Serialize for EngineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A rasterizer that opens documents from memory.
pub trait RasterEngine: Send {
    fn load_document<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Box<dyn EngineDocument + 'a>, EngineError>;
}

/// An open document. Closed when dropped.
pub trait EngineDocument {
    fn page_count(&self) -> u32;

    fn load_page(&self, index: u16) -> Result<Box<dyn EnginePage + '_>, EngineError>;
}

/// An open page. Closed when dropped.
pub trait EnginePage {
    /// Page size in points.
    fn size(&self) -> PageSize;

    /// Allocate a `width` x `height` BGRA target, fill it opaque white and
    /// rasterize the page into it with annotations and LCD text enabled.
    ///
    /// A target that cannot be allocated is [`EngineError::Allocation`]; if
    /// its pixels cannot be moved into caller memory it is
    /// [`EngineError::BufferAllocation`].
    fn render(&self, width: u32, height: u32) -> Result<Box<dyn EngineBitmap + '_>, EngineError>;
}

/// A rendered BGRA target. Destroyed when dropped.
pub trait EngineBitmap {
    /// Bytes per row, padding included.
    fn stride(&self) -> usize;

    /// Hand the pixel memory over, or `None` if the engine has no usable
    /// buffer. Later calls return `None`.
    fn take_buffer(&mut self) -> Option<Vec<u8>>;
}

type InitFn<E> = dyn Fn() -> Result<E, EngineError> + Send + Sync;

/// Owns the process-wide lock around an engine and its one-time setup.
///
/// The engine is created lazily inside the lock on first [`acquire`] and is
/// kept until the context itself is dropped. A failed setup is not cached;
/// the next call tries again.
///
/// [`acquire`]: EngineContext::acquire
pub struct EngineContext<E> {
    engine: Mutex<Option<E>>,
    initialized: AtomicBool,
    init: Box<InitFn<E>>,
}

impl<E: RasterEngine> EngineContext<E> {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<E, EngineError> + Send + Sync + 'static,
    {
        Self {
            engine: Mutex::new(None),
            initialized: AtomicBool::new(false),
            init: Box::new(init),
        }
    }

    /// Wrap an engine that is already set up.
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine: Mutex::new(Some(engine)),
            initialized: AtomicBool::new(true),
            init: Box::new(|| {
                Err(EngineError::Unavailable(
                    "engine was supplied pre-initialized".to_string(),
                ))
            }),
        }
    }

    /// Take the lock and make sure the engine is initialized.
    ///
    /// Blocks until any other holder releases the guard. A lock poisoned by a
    /// panicking holder is taken over; the engine itself stays as it was.
    pub fn acquire(&self) -> Result<EngineGuard<'_, E>, EngineError> {
        let mut slot = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            let engine = (self.init)()?;
            tracing::info!("Rendering engine initialized");
            *slot = Some(engine);
            self.initialized.store(true, Ordering::Release);
        }
        Ok(EngineGuard { slot })
    }

    /// Whether setup has succeeded. Does not wait for a render in progress.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

/// Exclusive access to an initialized engine. Releases the lock on drop.
pub struct EngineGuard<'c, E> {
    slot: MutexGuard<'c, Option<E>>,
}

impl<E> Deref for EngineGuard<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        match self.slot.as_ref() {
            Some(engine) => engine,
            // acquire() only hands out guards over a filled slot
            None => unreachable!("engine guard over an uninitialized slot"),
        }
    }
}
