use crate::error::{InkError, Result};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A physical or virtual panel. Calls are blocking and are always made
/// with exclusive access, one frame at a time.
pub trait DisplayDevice: Send {
    fn name(&self) -> &str;

    /// Push a fully processed frame to the panel.
    fn display(&mut self, frame: &RgbImage) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FileDevice
// ---------------------------------------------------------------------------

/// Writes each frame as a PNG, for frames driven by an external viewer or
/// when no hardware panel is attached.
pub struct FileDevice {
    path: PathBuf,
}

impl FileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DisplayDevice for FileDevice {
    fn name(&self) -> &str {
        "file"
    }

    fn display(&mut self, frame: &RgbImage) -> Result<()> {
        let mut buf = Vec::new();
        frame
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| InkError::DeviceWrite(format!("png encode: {e}")))?;
        crate::io::atomic_write(&self.path, &buf)
            .map_err(|e| InkError::DeviceWrite(format!("{}: {e}", self.path.display())))
    }
}

// ---------------------------------------------------------------------------
// MockDevice
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MockState {
    frames: Vec<String>,
    fail_next: usize,
    active: usize,
    max_active: usize,
}

/// In-memory device for tests. Clones share state, so a test can keep one
/// handle while the display manager owns another.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
    delay: Duration,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each write for `delay` to widen race windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `count` writes with a device error.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Hashes of every frame written so far, in write order.
    pub fn frames(&self) -> Vec<String> {
        self.lock().frames.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().frames.len()
    }

    /// Highest number of writes observed in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.lock().max_active
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplayDevice for MockDevice {
    fn name(&self) -> &str {
        "mock"
    }

    fn display(&mut self, frame: &RgbImage) -> Result<()> {
        {
            let mut state = self.lock();
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(InkError::DeviceWrite("mock device failure".into()));
            }
            state.active += 1;
            state.max_active = state.max_active.max(state.active);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let mut state = self.lock();
        state.active -= 1;
        state.frames.push(super::compute_image_hash(frame));
        Ok(())
    }
}
