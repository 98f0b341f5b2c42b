//! Canonical request/result types for text generation.
//!
//! A [`GenerationRequest`] is the provider-neutral description of one
//! generation; the router translates it into each backend's wire shape.
//! Requests are value objects — built once, never mutated.

use serde::{Deserialize, Serialize};

/// Default sampling temperature when the caller does not set one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default output token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

// ─────────────────────────────────────────────
// Prompt
// ─────────────────────────────────────────────

/// Prompt content — plain text or an ordered sequence of parts
/// (text and inline binary data for multimodal backends).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Text(String),
    Parts(Vec<PromptPart>),
}

/// A single part of a multi-part prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PromptPart {
    #[serde(rename = "text")]
    Text { text: String },
    /// Inline binary payload (image, document) with its MIME type.
    #[serde(rename = "data")]
    Data { data: Vec<u8>, mime_type: String },
}

impl Prompt {
    /// Plain-text prompt.
    pub fn text(s: impl Into<String>) -> Self {
        Prompt::Text(s.into())
    }

    /// Multi-part prompt.
    pub fn parts(parts: Vec<PromptPart>) -> Self {
        Prompt::Parts(parts)
    }

    /// Whether this prompt is a single text payload. Only such prompts
    /// participate in response caching — binary parts make poor keys and
    /// identical byte content is unlikely to recur.
    pub fn is_single_text(&self) -> bool {
        matches!(self, Prompt::Text(_))
    }

    /// The first text content in the prompt, if any. Providers that only
    /// accept flat text use this.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Prompt::Text(s) => Some(s),
            Prompt::Parts(parts) => parts.iter().find_map(|p| match p {
                PromptPart::Text { text } => Some(text.as_str()),
                PromptPart::Data { .. } => None,
            }),
        }
    }

    /// All text parts joined with newlines. Used by the local provider,
    /// which has no multimodal surface.
    pub fn joined_text(&self) -> String {
        match self {
            Prompt::Text(s) => s.clone(),
            Prompt::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    PromptPart::Text { text } => Some(text.as_str()),
                    PromptPart::Data { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Cache key for this prompt under the given model, or `None` when
    /// the prompt is not cacheable.
    pub fn cache_key(&self, model: &str) -> Option<String> {
        match self {
            Prompt::Text(s) => Some(format!("{}:{}", model, s)),
            Prompt::Parts(_) => None,
        }
    }
}

// ─────────────────────────────────────────────
// GenerationRequest / GenerationResult
// ─────────────────────────────────────────────

/// A provider-neutral text generation request.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// Model identifier hint, matched case-insensitively against the
    /// provider registry to pick a backend.
    pub model_hint: String,
    pub prompt: Prompt,
    /// System instruction; when `None` the router applies the configured
    /// default instruction.
    pub system_instruction: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Optional reasoning budget for models that expose one.
    pub thinking_budget: Option<u32>,
}

impl GenerationRequest {
    /// New request with default sampling parameters.
    pub fn new(model_hint: impl Into<String>, prompt: Prompt) -> Self {
        GenerationRequest {
            model_hint: model_hint.into(),
            prompt,
            system_instruction: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            thinking_budget: None,
        }
    }

    /// Convenience: plain-text request.
    pub fn text(model_hint: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(model_hint, Prompt::text(prompt))
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }
}

/// The outcome of a successfully routed generation.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationResult {
    pub text: String,
    /// Registry id of the provider that produced the answer.
    pub provider_used: String,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
