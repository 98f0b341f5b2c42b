//! Provider router — fallback-chain routing with per-provider retries.
//!
//! Two-tier resilience: the retry executor retries *within* one
//! provider (bounded backoff), and the router falls back *across*
//! providers in a single pass. Keeping the tiers separate matters —
//! retrying the whole chain indefinitely would disguise a persistent
//! outage as cache-miss latency.

use serde_json::Value;
use tracing::{info, warn};

use voxgate_core::cache::ResponseCache;
use voxgate_core::config::RouterConfig;
use voxgate_core::error::{GatewayError, ProviderFailure};
use voxgate_core::retry::RetryPolicy;
use voxgate_core::types::{GenerationRequest, GenerationResult, Prompt};

use crate::adapters::ProviderClient;
use crate::registry::{self, ProviderDescriptor, WireShape};

/// Marker used as `provider_used` when a response came from the cache.
pub const CACHE_PROVIDER: &str = "cache";

/// Routes canonical generation requests across the provider fallback
/// chain. Holds the process-wide response cache.
pub struct Router {
    config: RouterConfig,
    client: ProviderClient,
    cache: ResponseCache,
    retry: RetryPolicy,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Router {
            config,
            client: ProviderClient::new(),
            cache: ResponseCache::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy (tests use short delays).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Route one text generation request.
    ///
    /// Selection:
    /// 1. Cache hit short-circuits everything.
    /// 2. In sovereign-proxy mode the local backend is tried first; any
    ///    failure falls through silently to the normal chain.
    /// 3. Keyword-matched configured providers in registry order, then
    ///    the managed default, then the local backend.
    ///
    /// Succeeding single-text results are written to the cache before
    /// being returned. When every candidate fails the error carries the
    /// ordered per-provider failure chain.
    pub async fn route(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GatewayError> {
        if let Some(cached) = self.cache.get(&request.model_hint, &request.prompt) {
            return Ok(GenerationResult {
                text: cached,
                provider_used: CACHE_PROVIDER.to_string(),
            });
        }

        if self.config.sovereign_proxy {
            info!(model = %request.model_hint, "routing via sovereign backend proxy");
            match self
                .attempt_local(request, Some(request.model_hint.as_str()))
                .await
            {
                Ok(text) => return Ok(self.finish(request, text, "local")),
                Err(e) => {
                    // Single silent fallback: the normal chain still runs.
                    warn!(error = %e, "sovereign proxy failed, falling through");
                }
            }
        }

        let mut chain: Vec<ProviderFailure> = Vec::new();
        for descriptor in registry::candidates(&request.model_hint, &self.config.providers) {
            match self.attempt(descriptor, request).await {
                Ok(text) => {
                    if !chain.is_empty() {
                        info!(
                            provider = descriptor.id,
                            failed = chain.len(),
                            "fallback provider succeeded"
                        );
                    }
                    return Ok(self.finish(request, text, descriptor.id));
                }
                Err(e) => {
                    warn!(provider = descriptor.id, error = %e, "provider failed, advancing");
                    chain.push(ProviderFailure {
                        provider: descriptor.id.to_string(),
                        error: e,
                    });
                }
            }
        }

        Err(GatewayError::AllProvidersExhausted { chain })
    }

    /// Route a structured-output request and parse the reply as JSON.
    ///
    /// Deployment backends get `response_format: json_object` plus a
    /// schema-bearing prompt suffix; the managed backend takes the schema
    /// natively. The local backend has no JSON mode and is not attempted.
    pub async fn route_json(
        &self,
        request: &GenerationRequest,
        schema: &Value,
    ) -> Result<Value, GatewayError> {
        let mut chain: Vec<ProviderFailure> = Vec::new();

        for descriptor in registry::candidates(&request.model_hint, &self.config.providers) {
            let outcome = match descriptor.wire {
                WireShape::Deployment => {
                    let schema_prompt = format!(
                        "{}\n\nYou MUST respond with a valid JSON object only, conforming to this schema:\n{}",
                        request.prompt.joined_text(),
                        schema
                    );
                    let json_request = GenerationRequest {
                        prompt: Prompt::text(schema_prompt),
                        ..request.clone()
                    };
                    self.attempt_deployment(descriptor, &json_request, true).await
                }
                WireShape::Managed => {
                    let name = format!("generate_json_{}", descriptor.id);
                    self.retry
                        .execute_classified(
                            &name,
                            || {
                                self.client.call_managed(
                                    &self.config.providers.gemini,
                                    request,
                                    self.system_instruction(request),
                                    Some(schema),
                                )
                            },
                            GatewayError::is_retryable,
                        )
                        .await
                }
                WireShape::Local => continue,
            };

            match outcome {
                Ok(text) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| GatewayError::MalformedResponse(e.to_string()));
                }
                Err(e) => {
                    warn!(provider = descriptor.id, error = %e, "JSON provider failed");
                    chain.push(ProviderFailure {
                        provider: descriptor.id.to_string(),
                        error: e,
                    });
                }
            }
        }

        Err(GatewayError::AllProvidersExhausted { chain })
    }

    /// Cache lookup surface, mainly for diagnostics.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    // ─────────────────────────────────────────
    // Attempt plumbing
    // ─────────────────────────────────────────

    fn system_instruction<'a>(&'a self, request: &'a GenerationRequest) -> Option<&'a str> {
        request
            .system_instruction
            .as_deref()
            .or(self.config.system_instruction.as_deref())
    }

    fn finish(
        &self,
        request: &GenerationRequest,
        text: String,
        provider: &str,
    ) -> GenerationResult {
        self.cache.put(&request.model_hint, &request.prompt, &text);
        GenerationResult {
            text,
            provider_used: provider.to_string(),
        }
    }

    /// One provider attempt, wrapped in the retry executor. Auth and
    /// shape errors fail fast rather than burning attempts.
    async fn attempt(
        &self,
        descriptor: &'static ProviderDescriptor,
        request: &GenerationRequest,
    ) -> Result<String, GatewayError> {
        match descriptor.wire {
            WireShape::Managed => {
                let name = format!("generate_{}", descriptor.id);
                self.retry
                    .execute_classified(
                        &name,
                        || {
                            self.client.call_managed(
                                &self.config.providers.gemini,
                                request,
                                self.system_instruction(request),
                                None,
                            )
                        },
                        GatewayError::is_retryable,
                    )
                    .await
            }
            WireShape::Deployment => self.attempt_deployment(descriptor, request, false).await,
            WireShape::Local => self.attempt_local(request, None).await,
        }
    }

    async fn attempt_deployment(
        &self,
        descriptor: &'static ProviderDescriptor,
        request: &GenerationRequest,
        json_mode: bool,
    ) -> Result<String, GatewayError> {
        let profile = match descriptor.id {
            "gpt" => &self.config.providers.gpt,
            "claude" => &self.config.providers.claude,
            "deepseek" => &self.config.providers.deepseek,
            other => {
                return Err(GatewayError::MalformedResponse(format!(
                    "unknown deployment provider: {}",
                    other
                )))
            }
        };
        let name = format!("generate_{}", descriptor.id);
        self.retry
            .execute_classified(
                &name,
                || {
                    self.client.call_deployment(
                        profile,
                        request,
                        self.system_instruction(request),
                        json_mode,
                    )
                },
                GatewayError::is_retryable,
            )
            .await
    }

    async fn attempt_local(
        &self,
        request: &GenerationRequest,
        override_model: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.retry
            .execute_classified(
                "generate_local",
                || {
                    self.client.call_local(
                        &self.config.providers.local,
                        request,
                        self.system_instruction(request),
                        override_model,
                    )
                },
                GatewayError::is_retryable,
            )
            .await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
