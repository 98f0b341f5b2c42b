//! Voxgate audio — PCM codec, capture pipeline, playback scheduler.
//!
//! # Architecture
//!
//! - [`pcm`] — frame types and the f32 ↔ i16 quantizer
//! - [`capture`] — single-instance microphone controller over a device
//!   trait
//! - [`playback`] — gap-free, interruptible playback scheduling
//! - [`device`] — cpal-backed devices (`desktop-audio` feature only)

pub mod capture;
pub mod pcm;
pub mod playback;

#[cfg(feature = "desktop-audio")]
pub mod device;

pub use capture::{Capture, CaptureDevice};
pub use pcm::{AudioFrame, PlaybackFrame, CAPTURE_MIME, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE};
pub use playback::{OutputSink, PlaybackScheduler};
