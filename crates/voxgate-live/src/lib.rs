//! Voxgate live — duplex audio conversation pipeline.
//!
//! # Architecture
//!
//! - [`wire`] — transport envelopes: outbound media frames, inbound
//!   server content
//! - [`transport`] — [`LiveTransport`](transport::LiveTransport) trait +
//!   WebSocket implementation
//! - [`session`] — the lifecycle state machine wiring capture →
//!   transport → playback

pub mod session;
pub mod transport;
pub mod wire;

pub use session::{LiveSession, SessionStatus};
pub use transport::{LiveTransport, TransportFactory, WsFactory, WsTransport};
pub use wire::{OutboundMessage, ServerEvent};
