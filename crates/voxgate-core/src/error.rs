//! Gateway-wide error taxonomy.
//!
//! Every outbound call funnels its failures into [`GatewayError`] so the
//! retry executor and the provider router can make policy decisions
//! (retry, fail fast, advance to the next provider) on typed variants
//! instead of string matching.

use thiserror::Error;

/// Errors produced by the gateway core and its provider/audio layers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection failures, timeouts, and 5xx-class backend errors.
    /// These are worth retrying.
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// Missing or rejected credential. Retrying cannot succeed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Rate or billing limit hit. Surfaced with its own message so the
    /// caller can distinguish it from a dead backend.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The backend answered, but the payload was not in the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Microphone or speaker could not be opened.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// An operation failed on every allowed attempt.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<GatewayError>,
    },

    /// Every candidate provider in the fallback chain failed. Carries the
    /// per-provider failures in attempt order for diagnostics.
    #[error("all providers exhausted ({})", summarize_chain(.chain))]
    AllProvidersExhausted { chain: Vec<ProviderFailure> },
}

/// One failed provider attempt within a fallback chain.
#[derive(Debug)]
pub struct ProviderFailure {
    /// Registry id of the provider that failed.
    pub provider: String,
    pub error: GatewayError,
}

fn summarize_chain(chain: &[ProviderFailure]) -> String {
    chain
        .iter()
        .map(|f| format!("{}: {}", f.provider, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl GatewayError {
    /// Whether the retry executor should spend another attempt on this
    /// error. Auth and shape errors cannot be fixed by waiting; quota
    /// errors are retried so short rate-limit windows can clear.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            GatewayError::Auth(_)
                | GatewayError::MalformedResponse(_)
                | GatewayError::DeviceUnavailable(_)
        )
    }

    /// Map an HTTP status + body into the taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = format!("{}: {}", status, crate::utils::truncate_string(body, 200));
        match status {
            401 | 403 => GatewayError::Auth(detail),
            429 => GatewayError::QuotaExceeded(detail),
            _ => GatewayError::TransientNetwork(detail),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
