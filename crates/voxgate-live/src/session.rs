//! Live session state machine.
//!
//! One session owns one transport, the microphone capture pipeline, and
//! the playback scheduler, and wires them together:
//!
//! ```text
//! Disconnected → Connecting → Listening ⇄ Speaking
//!        (Error reachable from any state; close → Disconnected)
//! ```
//!
//! Capture frames, inbound server events, and the end-of-turn timer all
//! feed a single ordered event queue consumed by one task, so scheduler
//! and status state are never mutated re-entrantly from racing
//! callbacks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use voxgate_audio::capture::{Capture, CaptureDevice};
use voxgate_audio::pcm::{AudioFrame, PlaybackFrame};
use voxgate_audio::playback::PlaybackScheduler;
use voxgate_core::error::GatewayError;

use crate::transport::{LiveTransport, TransportFactory};
use crate::wire::{OutboundMessage, ServerEvent};

/// Silence from the server for this long is treated as end-of-turn.
const SPEAKING_TIMEOUT: Duration = Duration::from_secs(3);

// ─────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────

/// Session lifecycle state, observable through [`LiveSession::subscribe`].
#[derive(Clone, Debug, PartialEq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Listening,
    /// Audio from the model is playing (or played within the last
    /// [`SPEAKING_TIMEOUT`]).
    Speaking,
    /// The transport failed; carries a user-facing message.
    Error(String),
}

// ─────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────

enum SessionEvent {
    CapturedFrame(AudioFrame),
    Server(ServerEvent),
    TransportError(GatewayError),
    TransportClosed,
    Close,
}

// ─────────────────────────────────────────────
// LiveSession
// ─────────────────────────────────────────────

/// A duplex audio conversation. At most one transport is open per
/// session; `start` while connected is a no-op, `close` is idempotent
/// and safe in every state.
pub struct LiveSession {
    factory: Arc<dyn TransportFactory>,
    capture: Arc<Mutex<Capture>>,
    scheduler: Arc<PlaybackScheduler>,
    status_tx: watch::Sender<SessionStatus>,
    status_rx: watch::Receiver<SessionStatus>,
    transport: Option<Arc<dyn LiveTransport>>,
    events_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
    loop_task: Option<JoinHandle<()>>,
    pump_task: Option<JoinHandle<()>>,
}

impl LiveSession {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        capture_device: Box<dyn CaptureDevice>,
        scheduler: Arc<PlaybackScheduler>,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(SessionStatus::Disconnected);
        LiveSession {
            factory,
            capture: Arc::new(Mutex::new(Capture::new(capture_device))),
            scheduler,
            status_tx,
            status_rx,
            transport: None,
            events_tx: None,
            loop_task: None,
            pump_task: None,
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch status transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// Open the transport and begin the conversation.
    ///
    /// Only legal from `Disconnected` or `Error`; any other state means
    /// a transport is already open (or opening) and the call is ignored.
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        match self.status() {
            SessionStatus::Disconnected | SessionStatus::Error(_) => {}
            other => {
                warn!(status = ?other, "session already active, ignoring start");
                return Ok(());
            }
        }

        self.status_tx.send_replace(SessionStatus::Connecting);
        info!("opening live session");

        let transport = match self.factory.connect().await {
            Ok(t) => t,
            Err(e) => {
                self.status_tx
                    .send_replace(SessionStatus::Error(format!("Connection failed: {}", e)));
                return Err(e);
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Wire the microphone into the event queue.
        let frames_tx = events_tx.clone();
        if let Err(e) = self.capture.lock().unwrap().start(move |frame| {
            let _ = frames_tx.send(SessionEvent::CapturedFrame(frame));
        }) {
            let _ = transport.close().await;
            self.status_tx
                .send_replace(SessionStatus::Error(format!("Microphone failed: {}", e)));
            return Err(e);
        }

        // Pump inbound transport messages into the same queue.
        let pump_transport = transport.clone();
        let pump_tx = events_tx.clone();
        let pump_task = tokio::spawn(async move {
            loop {
                match pump_transport.next().await {
                    Some(Ok(event)) => {
                        if pump_tx.send(SessionEvent::Server(event)).is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = pump_tx.send(SessionEvent::TransportError(e));
                        break;
                    }
                    None => {
                        let _ = pump_tx.send(SessionEvent::TransportClosed);
                        break;
                    }
                }
            }
        });

        let loop_task = tokio::spawn(run_loop(
            events_rx,
            transport.clone(),
            self.status_tx.clone(),
            self.scheduler.clone(),
            self.capture.clone(),
        ));

        self.status_tx.send_replace(SessionStatus::Listening);
        self.transport = Some(transport);
        self.events_tx = Some(events_tx);
        self.loop_task = Some(loop_task);
        self.pump_task = Some(pump_task);
        Ok(())
    }

    /// Tear the session down. Safe to call in any state, any number of
    /// times, including before a connection ever completed.
    pub async fn close(&mut self) {
        if let Some(tx) = self.events_tx.take() {
            let _ = tx.send(SessionEvent::Close);
        }
        if let Some(task) = self.loop_task.take() {
            let _ = task.await;
        }
        if let Some(pump) = self.pump_task.take() {
            pump.abort();
        }
        if let Some(transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.capture.lock().unwrap().stop();

        if self.status() != SessionStatus::Disconnected {
            self.status_tx.send_replace(SessionStatus::Disconnected);
            info!("live session closed");
        }
    }
}

// ─────────────────────────────────────────────
// Event loop
// ─────────────────────────────────────────────

async fn run_loop(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    transport: Arc<dyn LiveTransport>,
    status: watch::Sender<SessionStatus>,
    scheduler: Arc<PlaybackScheduler>,
    capture: Arc<Mutex<Capture>>,
) {
    let mut speaking_deadline: Option<Instant> = None;

    loop {
        let deadline = speaking_deadline;
        let end_of_turn = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = end_of_turn => {
                speaking_deadline = None;
                status.send_replace(SessionStatus::Listening);
            }

            event = events.recv() => match event {
                Some(SessionEvent::CapturedFrame(frame)) => {
                    if let Err(e) = transport.send(OutboundMessage::media(&frame)).await {
                        capture.lock().unwrap().stop();
                        let _ = transport.close().await;
                        status.send_replace(SessionStatus::Error(format!(
                            "Connection failed: {}", e
                        )));
                        break;
                    }
                }

                Some(SessionEvent::Server(ServerEvent::AudioChunk(bytes))) => {
                    scheduler.enqueue(PlaybackFrame::new(bytes));
                    // A fresh chunk restarts the end-of-turn timer rather
                    // than transitioning again.
                    speaking_deadline = Some(Instant::now() + SPEAKING_TIMEOUT);
                    status.send_replace(SessionStatus::Speaking);
                }

                Some(SessionEvent::Server(ServerEvent::Interrupted)) => {
                    // Playback stops; the session status is untouched.
                    scheduler.interrupt();
                }

                Some(SessionEvent::Server(_)) => {}

                Some(SessionEvent::TransportError(e)) => {
                    capture.lock().unwrap().stop();
                    let _ = transport.close().await;
                    status.send_replace(SessionStatus::Error(format!(
                        "Connection failed: {}", e
                    )));
                    break;
                }

                Some(SessionEvent::TransportClosed) => {
                    capture.lock().unwrap().stop();
                    status.send_replace(SessionStatus::Disconnected);
                    break;
                }

                Some(SessionEvent::Close) | None => {
                    capture.lock().unwrap().stop();
                    let _ = transport.close().await;
                    status.send_replace(SessionStatus::Disconnected);
                    break;
                }
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use voxgate_audio::capture::WindowFn;
    use voxgate_audio::playback::OutputSink;

    // ── Fakes ──

    #[derive(Default)]
    struct FakeDevice {
        callback: Arc<Mutex<Option<WindowFn>>>,
        opens: Arc<AtomicU32>,
        closes: Arc<AtomicU32>,
    }

    impl CaptureDevice for FakeDevice {
        fn open(&mut self, on_window: WindowFn) -> Result<(), GatewayError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            *self.callback.lock().unwrap() = Some(on_window);
            Ok(())
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            *self.callback.lock().unwrap() = None;
        }
    }

    struct CountingSink {
        plays: AtomicU32,
        halts: AtomicU32,
    }

    impl CountingSink {
        fn new() -> Arc<Self> {
            Arc::new(CountingSink {
                plays: AtomicU32::new(0),
                halts: AtomicU32::new(0),
            })
        }
    }

    impl OutputSink for CountingSink {
        fn play(&self, _samples: Vec<f32>) {
            self.plays.fetch_add(1, Ordering::SeqCst);
        }
        fn halt(&self) {
            self.halts.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockTransport {
        inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<ServerEvent, GatewayError>>>,
        sent: Arc<Mutex<Vec<OutboundMessage>>>,
        connected: std::sync::atomic::AtomicBool,
        closes: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LiveTransport for MockTransport {
        async fn send(&self, msg: OutboundMessage) -> Result<(), GatewayError> {
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }

        async fn next(&self) -> Option<Result<ServerEvent, GatewayError>> {
            self.inbound.lock().await.recv().await
        }

        async fn close(&self) -> Result<(), GatewayError> {
            if self.connected.swap(false, Ordering::SeqCst) {
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    struct MockFactory {
        inbound: Mutex<Option<mpsc::UnboundedReceiver<Result<ServerEvent, GatewayError>>>>,
        sent: Arc<Mutex<Vec<OutboundMessage>>>,
        closes: Arc<AtomicU32>,
        connects: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl TransportFactory for MockFactory {
        async fn connect(&self) -> Result<Arc<dyn LiveTransport>, GatewayError> {
            if self.fail {
                return Err(GatewayError::TransientNetwork("refused".into()));
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            let inbound = self
                .inbound
                .lock()
                .unwrap()
                .take()
                .expect("factory connected more than once");
            Ok(Arc::new(MockTransport {
                inbound: tokio::sync::Mutex::new(inbound),
                sent: self.sent.clone(),
                connected: std::sync::atomic::AtomicBool::new(true),
                closes: self.closes.clone(),
            }))
        }
    }

    struct Harness {
        session: LiveSession,
        server_tx: mpsc::UnboundedSender<Result<ServerEvent, GatewayError>>,
        sent: Arc<Mutex<Vec<OutboundMessage>>>,
        closes: Arc<AtomicU32>,
        factory: Arc<MockFactory>,
        device_callback: Arc<Mutex<Option<WindowFn>>>,
        device_closes: Arc<AtomicU32>,
        sink: Arc<CountingSink>,
    }

    fn harness() -> Harness {
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closes = Arc::new(AtomicU32::new(0));
        let factory = Arc::new(MockFactory {
            inbound: Mutex::new(Some(server_rx)),
            sent: sent.clone(),
            closes: closes.clone(),
            connects: AtomicU32::new(0),
            fail: false,
        });

        let device = FakeDevice::default();
        let device_callback = device.callback.clone();
        let device_closes = device.closes.clone();

        let sink = CountingSink::new();
        let scheduler = Arc::new(PlaybackScheduler::new(sink.clone()));

        let session = LiveSession::new(factory.clone(), Box::new(device), scheduler);
        Harness {
            session,
            server_tx,
            sent,
            closes,
            factory,
            device_callback,
            device_closes,
            sink,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    /// One second of 24 kHz mono PCM, base64-free (raw bytes).
    fn chunk() -> ServerEvent {
        ServerEvent::AudioChunk(vec![0u8; 48_000])
    }

    // ── Tests ──

    #[tokio::test(start_paused = true)]
    async fn test_close_on_disconnected_is_noop() {
        let mut h = harness();
        h.session.close().await;
        assert_eq!(h.session.status(), SessionStatus::Disconnected);
        assert_eq!(h.factory.connects.load(Ordering::SeqCst), 0);
        assert_eq!(h.device_closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_connects_and_listens() {
        let mut h = harness();
        h.session.start().await.unwrap();
        assert_eq!(h.session.status(), SessionStatus::Listening);
        assert_eq!(h.factory.connects.load(Ordering::SeqCst), 1);
        h.session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_listening_is_noop() {
        let mut h = harness();
        h.session.start().await.unwrap();
        // A second start must not open a second transport.
        h.session.start().await.unwrap();
        assert_eq!(h.factory.connects.load(Ordering::SeqCst), 1);
        h.session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_lands_in_error() {
        let (_tx, server_rx) = mpsc::unbounded_channel();
        let factory = Arc::new(MockFactory {
            inbound: Mutex::new(Some(server_rx)),
            sent: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicU32::new(0)),
            connects: AtomicU32::new(0),
            fail: true,
        });
        let scheduler = Arc::new(PlaybackScheduler::new(CountingSink::new()));
        let mut session =
            LiveSession::new(factory, Box::new(FakeDevice::default()), scheduler);

        assert!(session.start().await.is_err());
        assert!(matches!(session.status(), SessionStatus::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_captured_frames_are_sent_as_media() {
        let mut h = harness();
        h.session.start().await.unwrap();

        if let Some(cb) = h.device_callback.lock().unwrap().as_mut() {
            cb(&[0.5, -0.5]);
        }
        settle().await;

        let sent = h.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let media = sent[0].media.as_ref().expect("media payload");
        assert_eq!(media.mime_type, "audio/pcm;rate=16000");
        assert!(!media.data.is_empty());
        drop(sent);
        h.session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_chunk_speaks_then_reverts_to_listening() {
        let mut h = harness();
        h.session.start().await.unwrap();

        h.server_tx.send(Ok(chunk())).unwrap();
        settle().await;
        assert_eq!(h.session.status(), SessionStatus::Speaking);
        assert_eq!(h.sink.plays.load(Ordering::SeqCst), 1);

        // 3 seconds of silence ends the turn.
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(h.session.status(), SessionStatus::Listening);
        h.session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_chunk_restarts_speaking_timer() {
        let mut h = harness();
        h.session.start().await.unwrap();

        h.server_tx.send(Ok(chunk())).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Second chunk before the timer fires pushes the deadline out.
        h.server_tx.send(Ok(chunk())).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.session.status(), SessionStatus::Speaking);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.session.status(), SessionStatus::Listening);
        h.session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_halts_playback_without_state_change() {
        let mut h = harness();
        h.session.start().await.unwrap();

        h.server_tx.send(Ok(chunk())).unwrap();
        settle().await;
        assert_eq!(h.session.status(), SessionStatus::Speaking);

        h.server_tx.send(Ok(ServerEvent::Interrupted)).unwrap();
        settle().await;
        assert_eq!(h.sink.halts.load(Ordering::SeqCst), 1);
        // Status untouched; the speaking timer still governs it.
        assert_eq!(h.session.status(), SessionStatus::Speaking);
        h.session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_stops_capture() {
        let mut h = harness();
        h.session.start().await.unwrap();

        h.server_tx
            .send(Err(GatewayError::TransientNetwork("reset".into())))
            .unwrap();
        settle().await;

        assert!(matches!(h.session.status(), SessionStatus::Error(_)));
        assert_eq!(h.device_closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_disconnects() {
        let mut h = harness();
        h.session.start().await.unwrap();

        drop(h.server_tx);
        settle().await;

        assert_eq!(h.session.status(), SessionStatus::Disconnected);
        assert_eq!(h.device_closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent() {
        let mut h = harness();
        h.session.start().await.unwrap();

        h.session.close().await;
        assert_eq!(h.session.status(), SessionStatus::Disconnected);
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
        assert_eq!(h.device_closes.load(Ordering::SeqCst), 1);

        // Second close: nothing new happens.
        h.session.close().await;
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
        assert_eq!(h.device_closes.load(Ordering::SeqCst), 1);
    }

}
