//! Raw PCM frame types and the f32 ↔ i16 codec.
//!
//! Capture emits 16 kHz mono frames; playback consumes 24 kHz mono
//! frames. Both sides are uncompressed little-endian 16-bit PCM — the
//! live transport moves raw sample bytes, not container formats.

/// Capture sample rate (microphone side).
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Playback sample rate (synthesized replies).
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Samples per capture window delivered by the device layer.
pub const CAPTURE_WINDOW: usize = 4096;

/// MIME hint attached to every outbound capture frame.
pub const CAPTURE_MIME: &str = "audio/pcm;rate=16000";

// ─────────────────────────────────────────────
// Frames
// ─────────────────────────────────────────────

/// One encoded capture window, ready to send over the live transport.
/// Immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub mime_hint: &'static str,
}

impl AudioFrame {
    /// Quantize one window of floating-point samples into a frame.
    pub fn from_f32(samples: &[f32]) -> Self {
        AudioFrame {
            samples: quantize(samples),
            mime_hint: CAPTURE_MIME,
        }
    }

    /// Little-endian byte view of the samples.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for s in &self.samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }
}

/// Raw inbound audio for playback: little-endian 16-bit PCM bytes plus
/// their declared format.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackFrame {
    pub raw_bytes: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PlaybackFrame {
    /// Frame in the default playback format (24 kHz mono).
    pub fn new(raw_bytes: Vec<u8>) -> Self {
        PlaybackFrame {
            raw_bytes,
            sample_rate: PLAYBACK_SAMPLE_RATE,
            channels: 1,
        }
    }

    /// Playback duration of this frame.
    pub fn duration(&self) -> std::time::Duration {
        let frames = self.raw_bytes.len() as u64 / (2 * self.channels as u64);
        std::time::Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

// ─────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────

/// Quantize f32 samples in [-1.0, 1.0] to i16.
///
/// Asymmetric scaling: negatives by 32768, non-negatives by 32767. That
/// keeps the range symmetric about zero — both full-scale extremes map
/// onto representable values without overflow.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            }
        })
        .collect()
}

/// Decode little-endian 16-bit PCM bytes into f32 samples in [-1.0, 1.0].
///
/// A trailing odd byte (truncated sample) is dropped.
pub fn decode_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
