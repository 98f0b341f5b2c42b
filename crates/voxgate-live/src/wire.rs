//! Live transport wire format.
//!
//! Outbound: a setup envelope on connect, then one media frame per
//! captured buffer (`{ media: { data, mimeType } }` with base64 PCM).
//! Inbound: `serverContent` envelopes carrying either synthesized audio
//! (`modelTurn.parts[0].inlineData.data`, base64 PCM at 24 kHz mono) or
//! an `interrupted` signal.

use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use voxgate_audio::pcm::AudioFrame;
use voxgate_core::config::LiveConfig;
use voxgate_core::error::GatewayError;

// ─────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────

/// A client → server message. Exactly one field is populated.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<Setup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaPayload>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Value>,
}

/// One captured audio buffer, base64-encoded.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    pub data: String,
    pub mime_type: String,
}

impl OutboundMessage {
    /// Session setup sent once after the transport opens.
    pub fn setup(config: &LiveConfig) -> Self {
        let generation_config = serde_json::json!({
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": config.voice } }
            },
        });
        let system_instruction = config
            .system_instruction
            .as_ref()
            .map(|text| serde_json::json!({ "parts": [{ "text": text }] }));

        OutboundMessage {
            setup: Some(Setup {
                model: config.model.clone(),
                generation_config,
                system_instruction,
            }),
            media: None,
        }
    }

    /// One captured frame as a realtime media payload.
    pub fn media(frame: &AudioFrame) -> Self {
        OutboundMessage {
            setup: None,
            media: Some(MediaPayload {
                data: base64::engine::general_purpose::STANDARD.encode(frame.to_le_bytes()),
                mime_type: frame.mime_hint.to_string(),
            }),
        }
    }
}

// ─────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────

/// A parsed server → client event.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    /// The server acknowledged the setup envelope.
    SetupComplete,
    /// Synthesized audio: raw PCM bytes at 24 kHz mono.
    AudioChunk(Vec<u8>),
    /// The user talked over the model; playback must stop now.
    Interrupted,
    /// Anything this client does not act on (turn metadata etc.).
    Other,
}

/// Parse one raw transport message.
pub fn parse_server_message(raw: &str) -> Result<ServerEvent, GatewayError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| GatewayError::MalformedResponse(format!("bad server message: {}", e)))?;

    if value.get("setupComplete").is_some() {
        return Ok(ServerEvent::SetupComplete);
    }

    let Some(content) = value.get("serverContent") else {
        return Ok(ServerEvent::Other);
    };

    if content["interrupted"].as_bool() == Some(true) {
        return Ok(ServerEvent::Interrupted);
    }

    if let Some(data) = content["modelTurn"]["parts"][0]["inlineData"]["data"].as_str() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| GatewayError::MalformedResponse(format!("bad audio payload: {}", e)))?;
        return Ok(ServerEvent::AudioChunk(bytes));
    }

    Ok(ServerEvent::Other)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
