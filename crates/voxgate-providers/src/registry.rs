//! Provider registry — static descriptors for all supported backends.
//!
//! Each [`ProviderDescriptor`] describes how to reach one backend:
//! keywords for model matching, wire shape, auth rule, default endpoint.
//! Order in [`PROVIDERS`] defines the default fallback priority.

use voxgate_core::config::ProvidersConfig;

// ─────────────────────────────────────────────
// ProviderDescriptor — static metadata for one provider
// ─────────────────────────────────────────────

/// The request/response shape a backend speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireShape {
    /// Managed cloud API: `{ model, contents, config }` body.
    Managed,
    /// Enterprise deployment: `/deployments/{name}/chat/completions`
    /// with a chat-messages array.
    Deployment,
    /// Self-hosted backend: chat or completion body, picked by endpoint.
    Local,
}

/// How a backend authenticates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthKind {
    /// API key as a `key` query parameter.
    KeyQuery,
    /// API key in an `api-key` header.
    ApiKeyHeader,
    /// No credential (local backends).
    None,
}

/// Static specification describing one backend.
#[derive(Clone, Debug)]
pub struct ProviderDescriptor {
    /// Registry id (matches the config profile name).
    pub id: &'static str,
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Keywords matched case-insensitively as substrings of the model
    /// hint. Empty for fallback-only providers.
    pub keywords: &'static [&'static str],
    pub wire: WireShape,
    pub auth: AuthKind,
    /// Default API base, for providers with a well-known endpoint.
    pub default_endpoint: Option<&'static str>,
    /// Fallback used when no keyword-matched provider is configured or
    /// all of them fail.
    pub is_default: bool,
    /// Self-hosted fallback of last resort; also tried first in
    /// sovereign-proxy mode.
    pub is_local: bool,
}

// ─────────────────────────────────────────────
// All providers (in fallback priority order)
// ─────────────────────────────────────────────

/// Complete provider list, in matching priority order.
pub static PROVIDERS: &[ProviderDescriptor] = &[
    // 1. GPT deployment — matched before the generic fallbacks
    ProviderDescriptor {
        id: "gpt",
        display_name: "GPT deployment",
        keywords: &["gpt-4", "gpt"],
        wire: WireShape::Deployment,
        auth: AuthKind::ApiKeyHeader,
        default_endpoint: None,
        is_default: false,
        is_local: false,
    },
    // 2. Claude deployment — the model hint doubles as the deployment name
    ProviderDescriptor {
        id: "claude",
        display_name: "Claude deployment",
        keywords: &["claude"],
        wire: WireShape::Deployment,
        auth: AuthKind::ApiKeyHeader,
        default_endpoint: None,
        is_default: false,
        is_local: false,
    },
    // 3. DeepSeek deployment
    ProviderDescriptor {
        id: "deepseek",
        display_name: "DeepSeek deployment",
        keywords: &["deepseek"],
        wire: WireShape::Deployment,
        auth: AuthKind::ApiKeyHeader,
        default_endpoint: None,
        is_default: false,
        is_local: false,
    },
    // 4. Gemini — managed default, also matched directly by keyword
    ProviderDescriptor {
        id: "gemini",
        display_name: "Gemini",
        keywords: &["gemini"],
        wire: WireShape::Managed,
        auth: AuthKind::KeyQuery,
        default_endpoint: Some("https://generativelanguage.googleapis.com/v1beta"),
        is_default: true,
        is_local: false,
    },
    // 5. Local backend — last resort, no credential
    ProviderDescriptor {
        id: "local",
        display_name: "Local backend",
        keywords: &["local"],
        wire: WireShape::Local,
        auth: AuthKind::None,
        default_endpoint: None,
        is_default: false,
        is_local: true,
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find a descriptor by exact registry id.
pub fn find_by_id(id: &str) -> Option<&'static ProviderDescriptor> {
    PROVIDERS.iter().find(|d| d.id == id)
}

/// The managed default provider.
pub fn default_provider() -> &'static ProviderDescriptor {
    PROVIDERS
        .iter()
        .find(|d| d.is_default)
        .expect("registry has a default provider")
}

/// The local/self-hosted provider.
pub fn local_provider() -> &'static ProviderDescriptor {
    PROVIDERS
        .iter()
        .find(|d| d.is_local)
        .expect("registry has a local provider")
}

/// Whether a descriptor's keywords match the model hint
/// (case-insensitive substring).
pub fn matches_model(descriptor: &ProviderDescriptor, model: &str) -> bool {
    let model_lower = model.to_lowercase();
    descriptor.keywords.iter().any(|kw| model_lower.contains(kw))
}

/// Build the ordered candidate chain for one request.
///
/// 1. Keyword-matched providers whose configuration is present, in
///    registry order.
/// 2. The managed default provider, if configured.
/// 3. The local provider.
///
/// Each provider appears at most once, keeping its earliest position.
pub fn candidates(
    model: &str,
    providers: &ProvidersConfig,
) -> Vec<&'static ProviderDescriptor> {
    let mut chain: Vec<&'static ProviderDescriptor> = PROVIDERS
        .iter()
        .filter(|d| matches_model(d, model) && providers.is_configured(d.id))
        .collect();

    let fallback = default_provider();
    if providers.is_configured(fallback.id) && !chain.iter().any(|d| d.id == fallback.id) {
        chain.push(fallback);
    }

    let local = local_provider();
    if providers.is_configured(local.id) && !chain.iter().any(|d| d.id == local.id) {
        chain.push(local);
    }

    chain
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
