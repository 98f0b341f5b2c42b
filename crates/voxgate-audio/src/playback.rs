//! Playback scheduler — gap-free, interruptible PCM output.
//!
//! The ordering guarantee lives in `enqueue`: the start slot for a frame
//! is reserved *synchronously*, before its decode task runs. Decodes may
//! complete in any order under load; reserved slots never move, so
//! frames cannot overlap or race each other.
//!
//! `interrupt` models one party talking over the other: every tracked
//! source stops immediately and the schedule restarts from the current
//! clock.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::time::Instant;
use tracing::{debug, info};

use crate::pcm::{decode_to_f32, PlaybackFrame};

// ─────────────────────────────────────────────
// Output sink
// ─────────────────────────────────────────────

/// Where decoded samples go at their scheduled start time. The cpal
/// speaker implements this behind the `desktop-audio` feature; tests use
/// a recording sink.
pub trait OutputSink: Send + Sync {
    /// Begin rendering one decoded buffer. Called exactly at the
    /// buffer's scheduled start.
    fn play(&self, samples: Vec<f32>);

    /// Drop everything currently rendering or buffered.
    fn halt(&self);
}

// ─────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────

struct QueueState {
    /// Reserved start of the next frame. `None` means the schedule is
    /// idle and the next frame starts at the current clock.
    next_start: Option<Instant>,
    /// Sources scheduled or playing; removed on natural end.
    active: HashSet<u64>,
    next_id: u64,
    /// Bumped by `interrupt` — tasks from an older epoch never start.
    epoch: u64,
}

/// Schedules decoded playback frames back-to-back on the output sink.
///
/// Explicitly constructed and owned by whichever component runs the live
/// session; no process-global audio state.
pub struct PlaybackScheduler {
    sink: Arc<dyn OutputSink>,
    state: Arc<Mutex<QueueState>>,
}

impl PlaybackScheduler {
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        PlaybackScheduler {
            sink,
            state: Arc::new(Mutex::new(QueueState {
                next_start: None,
                active: HashSet::new(),
                next_id: 0,
                epoch: 0,
            })),
        }
    }

    /// Enqueue one frame for gap-free playback.
    ///
    /// The start slot (`max(next_start, now)`) is computed and the
    /// reservation advanced before this function returns; decoding and
    /// waiting happen on a spawned task.
    pub fn enqueue(&self, frame: PlaybackFrame) {
        let duration = frame.duration();
        let now = Instant::now();

        let (id, epoch, start) = {
            let mut st = self.state.lock().unwrap();
            let start = st.next_start.map_or(now, |t| t.max(now));
            st.next_start = Some(start + duration);
            let id = st.next_id;
            st.next_id += 1;
            st.active.insert(id);
            (id, st.epoch, start)
        };

        debug!(id, ?duration, "frame scheduled");

        let sink = self.sink.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            // Decode after the slot is reserved; completion order is
            // irrelevant to the schedule.
            let samples = decode_to_f32(&frame.raw_bytes);

            tokio::time::sleep_until(start).await;

            {
                let st = state.lock().unwrap();
                // The session may have been interrupted while this frame
                // was waiting; a stale source must not start.
                if st.epoch != epoch || !st.active.contains(&id) {
                    return;
                }
            }

            sink.play(samples);
            tokio::time::sleep(duration).await;

            let mut st = state.lock().unwrap();
            if st.epoch == epoch {
                st.active.remove(&id);
            }
        });
    }

    /// Stop all playback immediately and restart the schedule from the
    /// current clock.
    pub fn interrupt(&self) {
        {
            let mut st = self.state.lock().unwrap();
            st.epoch += 1;
            st.active.clear();
            st.next_start = None;
        }
        self.sink.halt();
        info!("playback interrupted");
    }

    /// Number of sources scheduled or playing.
    pub fn active_sources(&self) -> usize {
        self.state.lock().unwrap().active.len()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
