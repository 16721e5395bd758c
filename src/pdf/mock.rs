//! Instrumented in-memory engine for tests.

use crate::pdf::engine::{EngineBitmap, EngineDocument, EngineError, EnginePage, RasterEngine};
use crate::pdf::raster::{PageSize, BYTES_PER_PIXEL};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Byte written into row padding so tests can spot it leaking out.
pub const PADDING_BYTE: u8 = 0xAB;

/// Records what the engine saw across threads.
#[derive(Default)]
pub struct Recorder {
    active: AtomicUsize,
    max_active: AtomicUsize,
    live_handles: AtomicUsize,
    buffer_addr: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl Recorder {
    /// Highest number of threads seen inside the engine at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Documents, pages and bitmaps not yet released.
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    /// Address of the last pixel buffer handed out by a bitmap.
    pub fn buffer_addr(&self) -> usize {
        self.buffer_addr.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn enter(&self) -> CallScope<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        CallScope(self)
    }

    fn open(&self, what: &str) {
        self.live_handles.fetch_add(1, Ordering::SeqCst);
        self.record(format!("open {what}"));
    }

    fn close(&self, what: &str) {
        let _call = self.enter();
        self.live_handles.fetch_sub(1, Ordering::SeqCst);
        self.record(format!("close {what}"));
    }
}

struct CallScope<'p>(&'p Recorder);

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Engine whose documents have the configured pages regardless of content.
///
/// Only buffers that start with `%PDF-` and end with `%%EOF` load, which is
/// enough to model truncated files.
#[derive(Clone, Default)]
pub struct MockEngine {
    pub pages: Vec<PageSize>,
    pub stride_padding: usize,
    pub short_stride: bool,
    pub missing_buffer: bool,
    pub fail_page_load: bool,
    pub fail_allocation: bool,
    pub fail_buffer_allocation: bool,
    pub render_delay: Duration,
    pub recorder: Arc<Recorder>,
}

impl MockEngine {
    /// A one-page US Letter document.
    pub fn new() -> Self {
        Self::with_pages(vec![PageSize::new(612.0, 792.0)])
    }

    pub fn with_pages(pages: Vec<PageSize>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn recorder(&self) -> Arc<Recorder> {
        self.recorder.clone()
    }
}

/// Smallest buffer the mock accepts as a document.
pub const MINIMAL_PDF: &[u8] = b"%PDF-1.7\n1 0 obj<<>>endobj\ntrailer<<>>\n%%EOF";

impl RasterEngine for MockEngine {
    fn load_document<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Box<dyn EngineDocument + 'a>, EngineError> {
        let _call = self.recorder.enter();
        if !bytes.starts_with(b"%PDF-") || !bytes.ends_with(b"%%EOF") {
            return Err(EngineError::Load("not a complete PDF".to_string()));
        }
        self.recorder.open("document");
        Ok(Box::new(MockDocument { engine: self }))
    }
}

struct MockDocument<'a> {
    engine: &'a MockEngine,
}

impl EngineDocument for MockDocument<'_> {
    fn page_count(&self) -> u32 {
        let _call = self.engine.recorder.enter();
        self.engine.pages.len() as u32
    }

    fn load_page(&self, index: u16) -> Result<Box<dyn EnginePage + '_>, EngineError> {
        let _call = self.engine.recorder.enter();
        let size = match self.engine.pages.get(index as usize) {
            Some(size) if !self.engine.fail_page_load => *size,
            _ => {
                return Err(EngineError::PageLoad {
                    index,
                    reason: "page object missing".to_string(),
                })
            }
        };
        self.engine.recorder.open("page");
        Ok(Box::new(MockPage {
            engine: self.engine,
            size,
        }))
    }
}

impl Drop for MockDocument<'_> {
    fn drop(&mut self) {
        self.engine.recorder.close("document");
    }
}

struct MockPage<'a> {
    engine: &'a MockEngine,
    size: PageSize,
}

impl EnginePage for MockPage<'_> {
    fn size(&self) -> PageSize {
        let _call = self.engine.recorder.enter();
        self.size
    }

    fn render(&self, width: u32, height: u32) -> Result<Box<dyn EngineBitmap + '_>, EngineError> {
        let _call = self.engine.recorder.enter();
        if self.engine.fail_allocation {
            return Err(EngineError::Allocation {
                width,
                height,
                reason: "out of memory".to_string(),
            });
        }
        if self.engine.fail_buffer_allocation {
            return Err(EngineError::BufferAllocation {
                bytes: width as usize * height as usize * BYTES_PER_PIXEL,
            });
        }

        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let stride = if self.engine.short_stride {
            row_bytes.saturating_sub(BYTES_PER_PIXEL)
        } else {
            row_bytes + self.engine.stride_padding
        };
        let mut buffer = vec![PADDING_BYTE; stride * height as usize];
        if stride >= row_bytes {
            for row in buffer.chunks_mut(stride.max(1)) {
                row[..row_bytes].fill(0xFF);
            }
        }

        std::thread::sleep(self.engine.render_delay);
        self.engine.recorder.open("bitmap");
        Ok(Box::new(MockBitmap {
            engine: self.engine,
            stride,
            buffer,
        }))
    }
}

impl Drop for MockPage<'_> {
    fn drop(&mut self) {
        self.engine.recorder.close("page");
    }
}

struct MockBitmap<'a> {
    engine: &'a MockEngine,
    stride: usize,
    buffer: Vec<u8>,
}

impl EngineBitmap for MockBitmap<'_> {
    fn stride(&self) -> usize {
        self.stride
    }

    fn take_buffer(&mut self) -> Option<Vec<u8>> {
        if self.engine.missing_buffer {
            return None;
        }
        let buffer = std::mem::take(&mut self.buffer);
        self.engine
            .recorder
            .buffer_addr
            .store(buffer.as_ptr() as usize, Ordering::SeqCst);
        Some(buffer)
    }
}

impl Drop for MockBitmap<'_> {
    fn drop(&mut self) {
        self.engine.recorder.close("bitmap");
    }
}
