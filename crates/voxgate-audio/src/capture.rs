//! Microphone capture — fixed windows of quantized PCM frames.
//!
//! The platform device sits behind [`CaptureDevice`] so the pipeline and
//! the live session can be exercised without hardware; the cpal-backed
//! implementation lives in [`crate::device`] behind the `desktop-audio`
//! feature.

use tracing::{info, warn};

use voxgate_core::error::GatewayError;

use crate::pcm::AudioFrame;

/// Callback receiving one window of raw f32 samples in [-1.0, 1.0].
pub type WindowFn = Box<dyn FnMut(&[f32]) + Send>;

/// A monophonic 16 kHz input device delivering fixed 4096-sample
/// windows.
pub trait CaptureDevice: Send {
    /// Open the device and begin delivering windows to `on_window`.
    fn open(&mut self, on_window: WindowFn) -> Result<(), GatewayError>;

    /// Stop delivering windows and release the device. Must be safe to
    /// call when not open.
    fn close(&mut self);
}

/// Single-instance capture controller: quantizes each device window into
/// an [`AudioFrame`] and hands it to the consumer.
pub struct Capture {
    device: Box<dyn CaptureDevice>,
    active: bool,
}

impl Capture {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Capture {
            device,
            active: false,
        }
    }

    /// Start capturing. Starting while already active is a no-op with a
    /// warning — duplicate UI triggers must not error or double-open the
    /// device.
    pub fn start(
        &mut self,
        mut on_frame: impl FnMut(AudioFrame) + Send + 'static,
    ) -> Result<(), GatewayError> {
        if self.active {
            warn!("capture already active, ignoring start");
            return Ok(());
        }

        self.device
            .open(Box::new(move |window| on_frame(AudioFrame::from_f32(window))))?;
        self.active = true;
        info!("microphone capture started");
        Ok(())
    }

    /// Stop capturing. Idempotent.
    pub fn stop(&mut self) {
        if self.active {
            self.device.close();
            self.active = false;
            info!("microphone capture stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
