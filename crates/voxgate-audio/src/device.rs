//! cpal-backed microphone and speaker devices (`desktop-audio` feature).
//!
//! cpal streams are not `Send`, so each device parks its stream on a
//! dedicated thread and communicates over channels.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, warn};

use voxgate_core::error::GatewayError;

use crate::capture::{CaptureDevice, WindowFn};
use crate::pcm::{CAPTURE_SAMPLE_RATE, CAPTURE_WINDOW, PLAYBACK_SAMPLE_RATE};
use crate::playback::OutputSink;

// ─────────────────────────────────────────────
// Microphone
// ─────────────────────────────────────────────

/// Default microphone, resampled by the host to 16 kHz mono and
/// re-windowed into fixed 4096-sample buffers.
#[derive(Default)]
pub struct CpalMicrophone {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CaptureDevice for CpalMicrophone {
    fn open(&mut self, mut on_window: WindowFn) -> Result<(), GatewayError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), GatewayError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::spawn(move || {
            let host = cpal::default_host();
            let Some(device) = host.default_input_device() else {
                let _ = ready_tx.send(Err(GatewayError::DeviceUnavailable(
                    "no input device".into(),
                )));
                return;
            };

            let config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(CAPTURE_SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            };

            // The device delivers arbitrary buffer sizes; accumulate and
            // emit fixed windows.
            let mut pending: Vec<f32> = Vec::with_capacity(CAPTURE_WINDOW * 2);
            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _| {
                    pending.extend_from_slice(data);
                    while pending.len() >= CAPTURE_WINDOW {
                        let window: Vec<f32> = pending.drain(..CAPTURE_WINDOW).collect();
                        on_window(&window);
                    }
                },
                |e| error!(error = %e, "input stream error"),
                None,
            );

            match stream {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        let _ = ready_tx
                            .send(Err(GatewayError::DeviceUnavailable(e.to_string())));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));
                    // Keep the stream alive until close() signals.
                    let _ = stop_rx.recv();
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(GatewayError::DeviceUnavailable(e.to_string())));
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GatewayError::DeviceUnavailable(
                "input thread died during open".into(),
            )),
        }
    }

    fn close(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("input thread panicked");
            }
        }
    }
}

// ─────────────────────────────────────────────
// Speaker
// ─────────────────────────────────────────────

/// Default output device at 24 kHz mono, fed from a shared sample queue.
/// `halt` empties the queue, cutting playback at the next device buffer.
pub struct CpalSpeaker {
    queue: Arc<Mutex<VecDeque<f32>>>,
    stop_tx: mpsc::Sender<()>,
}

impl CpalSpeaker {
    /// Open the default output device and start draining the queue.
    pub fn start() -> Result<Self, GatewayError> {
        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), GatewayError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let feed = queue.clone();
        std::thread::spawn(move || {
            let host = cpal::default_host();
            let Some(device) = host.default_output_device() else {
                let _ = ready_tx.send(Err(GatewayError::DeviceUnavailable(
                    "no output device".into(),
                )));
                return;
            };

            let config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(PLAYBACK_SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            };

            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _| {
                    let mut queue = feed.lock().unwrap();
                    for slot in data.iter_mut() {
                        *slot = queue.pop_front().unwrap_or(0.0);
                    }
                },
                |e| error!(error = %e, "output stream error"),
                None,
            );

            match stream {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        let _ = ready_tx
                            .send(Err(GatewayError::DeviceUnavailable(e.to_string())));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));
                    let _ = stop_rx.recv();
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(GatewayError::DeviceUnavailable(e.to_string())));
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CpalSpeaker { queue, stop_tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GatewayError::DeviceUnavailable(
                "output thread died during open".into(),
            )),
        }
    }
}

impl OutputSink for CpalSpeaker {
    fn play(&self, samples: Vec<f32>) {
        self.queue.lock().unwrap().extend(samples);
    }

    fn halt(&self) {
        self.queue.lock().unwrap().clear();
    }
}

impl Drop for CpalSpeaker {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
