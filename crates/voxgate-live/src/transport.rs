//! Live transport — WebSocket connection to the audio backend.
//!
//! The trait seam lets the session state machine run against an
//! in-memory transport in tests; [`WsTransport`] is the production
//! implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use voxgate_core::config::LiveConfig;
use voxgate_core::error::GatewayError;

use crate::wire::{parse_server_message, OutboundMessage, ServerEvent};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;

// ─────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────

/// A connected duplex transport carrying live audio in both directions.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    async fn send(&self, msg: OutboundMessage) -> Result<(), GatewayError>;

    /// Next parsed server event. `None` once the transport has closed.
    async fn next(&self) -> Option<Result<ServerEvent, GatewayError>>;

    /// Close the transport. Idempotent — closing twice is a no-op.
    async fn close(&self) -> Result<(), GatewayError>;

    fn is_connected(&self) -> bool;
}

/// Opens transports. The live session connects through this seam so the
/// state machine is testable without a network.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn LiveTransport>, GatewayError>;
}

// ─────────────────────────────────────────────
// WebSocket implementation
// ─────────────────────────────────────────────

/// WebSocket transport. Sends the setup envelope on connect, then relays
/// media frames out and parses server envelopes in.
pub struct WsTransport {
    sender: Mutex<WsSink>,
    receiver: Mutex<WsSource>,
    connected: AtomicBool,
}

impl WsTransport {
    /// Connect and perform session setup.
    pub async fn connect(config: &LiveConfig) -> Result<Self, GatewayError> {
        if config.api_key.is_empty() {
            return Err(GatewayError::Auth("no live API key configured".into()));
        }

        let url = format!("{}?key={}", config.endpoint, config.api_key);
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| GatewayError::TransientNetwork(format!("connect failed: {}", e)))?;
        info!(model = %config.model, "live transport connected");

        let (sink, source) = stream.split();
        let transport = WsTransport {
            sender: Mutex::new(sink),
            receiver: Mutex::new(source),
            connected: AtomicBool::new(true),
        };

        transport.send(OutboundMessage::setup(config)).await?;
        Ok(transport)
    }
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn send(&self, msg: OutboundMessage) -> Result<(), GatewayError> {
        let text = serde_json::to_string(&msg)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| GatewayError::TransientNetwork(format!("send failed: {}", e)))
    }

    async fn next(&self) -> Option<Result<ServerEvent, GatewayError>> {
        let mut receiver = self.receiver.lock().await;
        loop {
            match receiver.next().await {
                Some(Ok(Message::Text(text))) => {
                    debug!(bytes = text.len(), "server message");
                    return Some(parse_server_message(&text));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.into()) {
                    Ok(text) => return Some(parse_server_message(&text)),
                    Err(e) => {
                        return Some(Err(GatewayError::MalformedResponse(format!(
                            "binary frame was not UTF-8: {}",
                            e
                        ))))
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return None;
                }
                Some(Ok(_)) => continue, // ping/pong
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Some(Err(GatewayError::TransientNetwork(format!(
                        "receive failed: {}",
                        e
                    ))));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), GatewayError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut sender = self.sender.lock().await;
        // Best effort — the peer may already be gone.
        let _ = sender.send(Message::Close(None)).await;
        info!("live transport closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Factory producing [`WsTransport`] connections from config.
pub struct WsFactory {
    config: LiveConfig,
}

impl WsFactory {
    pub fn new(config: LiveConfig) -> Self {
        WsFactory { config }
    }
}

#[async_trait]
impl TransportFactory for WsFactory {
    async fn connect(&self) -> Result<Arc<dyn LiveTransport>, GatewayError> {
        Ok(Arc::new(WsTransport::connect(&self.config).await?))
    }
}
