//! Display manager: the single gate between rendered content and the panel.
//!
//! Writes are serialized through a fair (FIFO) async mutex. Everything from
//! hashing to the device call to updating `last_hash` happens while the
//! lock is held, so concurrent callers observe writes in arrival order and
//! deduplication is never racy.

pub mod device;
pub mod pipeline;

pub use device::{DisplayDevice, FileDevice, MockDevice};
pub use pipeline::{compute_image_hash, DisplayProfile, KEEP_WIDTH};

use crate::error::{InkError, Result};
use crate::types::WriteOutcome;
use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct DeviceState {
    device: Box<dyn DisplayDevice>,
    last_hash: Option<String>,
}

#[derive(Clone)]
pub struct DisplayManager {
    profile: Arc<DisplayProfile>,
    state: Arc<Mutex<DeviceState>>,
}

impl DisplayManager {
    pub fn new(device: Box<dyn DisplayDevice>, profile: DisplayProfile) -> Self {
        Self {
            profile: Arc::new(profile),
            state: Arc::new(Mutex::new(DeviceState {
                device,
                last_hash: None,
            })),
        }
    }

    /// Seed the dedupe hash, typically from the persisted refresh record so a
    /// restart does not redraw an unchanged frame.
    pub fn with_last_hash(self, hash: Option<String>) -> Self {
        if let Ok(mut state) = self.state.try_lock() {
            state.last_hash = hash;
        }
        self
    }

    /// Hash of the frame currently on the panel, if any.
    pub async fn last_hash(&self) -> Option<String> {
        self.state.lock().await.last_hash.clone()
    }

    /// Process `image` and push it to the device unless it matches what is
    /// already shown. `force` bypasses the comparison.
    ///
    /// A failed device write leaves `last_hash` unchanged.
    pub async fn write(
        &self,
        image: DynamicImage,
        image_settings: &[String],
        force: bool,
    ) -> Result<WriteOutcome> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let profile = Arc::clone(&self.profile);
        let image_settings = image_settings.to_vec();

        // The owned guard travels into the blocking task and is released when
        // it finishes, even if this future is dropped meanwhile.
        tokio::task::spawn_blocking(move || {
            let mut state = guard;
            let frame = pipeline::process(&image, &profile, &image_settings);
            let image_hash = compute_image_hash(&frame);

            if !force && state.last_hash.as_deref() == Some(image_hash.as_str()) {
                debug!(hash = %image_hash, "frame unchanged, skipping device write");
                return Ok(WriteOutcome::Skipped { image_hash });
            }

            let device = state.device.name().to_string();
            if let Err(e) = state.device.display(&frame) {
                warn!(device = %device, error = %e, "device write failed");
                return Err(e);
            }
            state.last_hash = Some(image_hash.clone());
            info!(device = %device, hash = %image_hash, force, "frame written");
            Ok(WriteOutcome::Applied { image_hash })
        })
        .await
        .map_err(|e| InkError::DeviceWrite(format!("display task aborted: {e}")))?
    }
}
