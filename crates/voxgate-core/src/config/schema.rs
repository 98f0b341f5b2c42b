//! Configuration schema.
//!
//! Hierarchy: `Config` → `RouterConfig`, `LiveConfig`.
//!
//! The router and live session receive these as explicit values at
//! construction — core logic never reads credentials or endpoints from
//! ambient state, so tests can run against fixture configs.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.voxgate/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub router: RouterConfig,
    pub live: LiveConfig,
}

// ─────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────

/// Everything the provider router needs to route one request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterConfig {
    /// When set, the local/self-hosted provider is tried first for every
    /// request, falling through to the normal chain on failure.
    pub sovereign_proxy: bool,
    /// Default model hint for fast conversational requests.
    pub fast_model: String,
    /// Model hint for requests that warrant a reasoning budget.
    pub reasoning_model: String,
    /// System instruction applied when a request carries none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    pub providers: ProvidersConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            sovereign_proxy: false,
            fast_model: "gemini-2.5-flash".to_string(),
            reasoning_model: "gemini-3-pro-preview".to_string(),
            system_instruction: None,
            providers: ProvidersConfig::default(),
        }
    }
}

/// One profile per supported backend.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub gemini: ManagedConfig,
    pub gpt: DeploymentConfig,
    pub claude: DeploymentConfig,
    pub deepseek: DeploymentConfig,
    pub local: LocalConfig,
}

impl ProvidersConfig {
    /// Look up a profile's configured state by registry id.
    pub fn is_configured(&self, id: &str) -> bool {
        match id {
            "gemini" => self.gemini.is_configured(),
            "gpt" => self.gpt.is_configured(),
            "claude" => self.claude.is_configured(),
            "deepseek" => self.deepseek.is_configured(),
            "local" => self.local.is_configured(),
            _ => false,
        }
    }
}

/// The default managed cloud provider (API-key auth, multimodal).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagedConfig {
    #[serde(default)]
    pub api_key: String,
    /// Override for the provider's default API base.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ManagedConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// An enterprise deployment endpoint (`api-key` header auth, chat
/// completions shape). `deployment` may be empty for backends where the
/// model hint doubles as the deployment name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub deployment: String,
}

impl DeploymentConfig {
    /// A deployment profile needs both an endpoint and a credential.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty()
    }
}

/// A local/self-hosted backend. Always considered configured — it is the
/// fallback of last resort and needs no credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalConfig {
    pub endpoint: String,
    /// Model name to request when the caller's hint targets the local
    /// backend generically.
    pub default_model: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        LocalConfig {
            endpoint: "http://localhost:8000/api/v1/chat".to_string(),
            default_model: "llama3".to_string(),
        }
    }
}

impl LocalConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty()
    }
}

// ─────────────────────────────────────────────
// Live session
// ─────────────────────────────────────────────

/// Live duplex audio session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveConfig {
    /// WebSocket endpoint of the live audio backend.
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    /// Prebuilt voice name for synthesized replies.
    pub voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            endpoint:
                "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent"
                    .to_string(),
            api_key: String::new(),
            model: "gemini-2.5-flash-native-audio-preview".to_string(),
            voice: "Zephyr".to_string(),
            system_instruction: None,
        }
    }
}

impl LiveConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
