//! Wire-shape adapters — one HTTP client, three backend dialects.
//!
//! The router hands each adapter a canonical
//! [`GenerationRequest`](voxgate_core::GenerationRequest); the adapter
//! translates it into the backend's body shape, performs the call, and
//! translates the raw response back into plain text. All failures map
//! into the gateway error taxonomy so the retry executor and fallback
//! chain can act on them.

use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use voxgate_core::config::{DeploymentConfig, LocalConfig, ManagedConfig};
use voxgate_core::error::GatewayError;
use voxgate_core::types::{GenerationRequest, Prompt, PromptPart};

use crate::registry;

/// Overall timeout for a single provider attempt.
const ATTEMPT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// The local backend must not hang the tail of the fallback chain.
const LOCAL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

// ─────────────────────────────────────────────
// ProviderClient
// ─────────────────────────────────────────────

/// Shared, connection-pooled HTTP client for all provider calls.
pub struct ProviderClient {
    client: reqwest::Client,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        ProviderClient { client }
    }

    // ─────────────────────────────────────────
    // Managed cloud API
    // ─────────────────────────────────────────

    /// Call the managed provider: `{ model, contents, config }` body,
    /// API key as query parameter.
    ///
    /// `json_schema` switches the call into structured-output mode.
    pub async fn call_managed(
        &self,
        config: &ManagedConfig,
        request: &GenerationRequest,
        system_instruction: Option<&str>,
        json_schema: Option<&Value>,
    ) -> Result<String, GatewayError> {
        if config.api_key.is_empty() {
            return Err(GatewayError::Auth("no API key configured".into()));
        }

        let base = config
            .endpoint
            .as_deref()
            .or(registry::find_by_id("gemini").and_then(|d| d.default_endpoint))
            .unwrap_or_default();
        let url = format!(
            "{}/models/{}:generateContent",
            base.trim_end_matches('/'),
            request.model_hint
        );

        let mut gen_config = json!({
            "temperature": request.temperature,
            "maxOutputTokens": request.max_tokens,
        });
        if let Some(instruction) = system_instruction {
            gen_config["systemInstruction"] = json!(instruction);
        }
        if let Some(budget) = request.thinking_budget {
            gen_config["thinkingConfig"] = json!({ "thinkingBudget": budget });
        }
        if let Some(schema) = json_schema {
            gen_config["responseMimeType"] = json!("application/json");
            gen_config["responseSchema"] = schema.clone();
        }

        let body = json!({
            "model": request.model_hint,
            "contents": prompt_to_contents(&request.prompt),
            "config": gen_config,
        });

        debug!(model = %request.model_hint, "calling managed provider");

        let response = self
            .client
            .post(&url)
            .query(&[("key", config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let value = check_and_parse(response).await?;
        extract_managed_text(&value)
    }

    // ─────────────────────────────────────────
    // Enterprise deployment API
    // ─────────────────────────────────────────

    /// Call a deployment backend:
    /// `POST {endpoint}/deployments/{name}/chat/completions` with an
    /// `api-key` header and a chat-messages body.
    pub async fn call_deployment(
        &self,
        config: &DeploymentConfig,
        request: &GenerationRequest,
        system_instruction: Option<&str>,
        json_mode: bool,
    ) -> Result<String, GatewayError> {
        if config.api_key.is_empty() {
            return Err(GatewayError::Auth("no API key configured".into()));
        }

        // Some backends name deployments after the model itself.
        let deployment = if config.deployment.is_empty() {
            request.model_hint.as_str()
        } else {
            config.deployment.as_str()
        };
        let url = format!(
            "{}/deployments/{}/chat/completions?api-version=2024-02-01",
            config.endpoint.trim_end_matches('/'),
            deployment
        );

        let text_prompt = request.prompt.first_text().unwrap_or_default();
        let mut messages = Vec::new();
        if let Some(instruction) = system_instruction {
            messages.push(json!({ "role": "system", "content": instruction }));
        }
        messages.push(json!({ "role": "user", "content": text_prompt }));

        let mut body = json!({
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": if json_mode { 0.2 } else { request.temperature },
        });
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        debug!(deployment, "calling deployment provider");

        let response = self
            .client
            .post(&url)
            .header("api-key", &config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let value = check_and_parse(response).await?;
        let parsed: ChatCompletionsReply = serde_json::from_value(value)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GatewayError::MalformedResponse("no choices in response".into()))
    }

    // ─────────────────────────────────────────
    // Local / self-hosted backend
    // ─────────────────────────────────────────

    /// Call the local backend. Two dialects, picked by endpoint pattern:
    /// chat-style (`{ messages, model, temperature }` →
    /// `{ content, model }`) for endpoints that expose a chat route, and
    /// completion-style (`{ model, prompt, stream: false }` →
    /// `{ response | text, model_used? }`) otherwise.
    ///
    /// The reply carries a short suffix naming the backend that answered,
    /// so fallback responses are distinguishable in transcripts.
    pub async fn call_local(
        &self,
        config: &LocalConfig,
        request: &GenerationRequest,
        system_instruction: Option<&str>,
        override_model: Option<&str>,
    ) -> Result<String, GatewayError> {
        let model = override_model.unwrap_or(&config.default_model);
        let text_prompt = request.prompt.joined_text();
        let chat_style = config.endpoint.contains("/chat") || config.endpoint.contains(":8000");

        debug!(endpoint = %config.endpoint, model, chat_style, "calling local backend");

        let body = if chat_style {
            let mut messages = Vec::new();
            if let Some(instruction) = system_instruction {
                messages.push(json!({ "role": "system", "content": instruction }));
            }
            messages.push(json!({ "role": "user", "content": text_prompt }));
            json!({ "messages": messages, "model": model, "temperature": request.temperature })
        } else {
            json!({ "model": model, "prompt": text_prompt, "stream": false })
        };

        let response = self
            .client
            .post(&config.endpoint)
            .timeout(LOCAL_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let value = check_and_parse(response).await?;

        let text = if chat_style {
            value["content"].as_str().map(str::to_string)
        } else {
            value["response"]
                .as_str()
                .or_else(|| value["text"].as_str())
                .map(str::to_string)
        };
        let mut text = text
            .ok_or_else(|| GatewayError::MalformedResponse("no text in local reply".into()))?;

        if let Some(backend_model) = value["model"].as_str() {
            text.push_str(&format!("\n\n*[Generated via Backend ({})]*", backend_model));
        } else if let Some(used) = value["model_used"].as_str() {
            text.push_str(&format!("\n\n*[Processed by {}]*", used));
        } else {
            text.push_str(&format!("\n\n*[Generated via Local Fallback ({})]*", model));
        }

        Ok(text)
    }
}

// ─────────────────────────────────────────────
// Response plumbing
// ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletionsReply {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Map connection-level failures into the taxonomy.
fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::TransientNetwork(format!("request timed out: {}", e))
    } else {
        GatewayError::TransientNetwork(e.to_string())
    }
}

/// Fail on non-2xx (carrying the status), then parse the JSON body.
async fn check_and_parse(response: reqwest::Response) -> Result<Value, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "provider API error");
        return Err(GatewayError::from_status(status.as_u16(), &body));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))
}

/// Canonical prompt → managed `contents` field: a bare string for text
/// prompts, `{ parts: [...] }` for multi-part prompts.
fn prompt_to_contents(prompt: &Prompt) -> Value {
    match prompt {
        Prompt::Text(s) => json!(s),
        Prompt::Parts(parts) => {
            let parts: Vec<Value> = parts
                .iter()
                .map(|p| match p {
                    PromptPart::Text { text } => json!({ "text": text }),
                    PromptPart::Data { data, mime_type } => json!({
                        "inlineData": {
                            "mimeType": mime_type,
                            "data": base64::engine::general_purpose::STANDARD.encode(data),
                        }
                    }),
                })
                .collect();
            json!({ "parts": parts })
        }
    }
}

/// Pull the answer text out of a managed-provider envelope.
fn extract_managed_text(value: &Value) -> Result<String, GatewayError> {
    value["candidates"][0]["content"]["parts"]
        .as_array()
        .and_then(|parts| parts.iter().find_map(|p| p["text"].as_str()))
        .map(str::to_string)
        .ok_or_else(|| GatewayError::MalformedResponse("no text candidate in response".into()))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn managed_config(server: &MockServer) -> ManagedConfig {
        ManagedConfig {
            api_key: "g-key".into(),
            endpoint: Some(server.uri()),
        }
    }

    fn deployment_config(server: &MockServer) -> DeploymentConfig {
        DeploymentConfig {
            endpoint: server.uri(),
            api_key: "d-key".into(),
            deployment: "gpt-4o".into(),
        }
    }

    fn local_chat_config(server: &MockServer) -> LocalConfig {
        LocalConfig {
            endpoint: format!("{}/api/v1/chat", server.uri()),
            default_model: "llama3".into(),
        }
    }

    fn managed_reply(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] }
            }]
        })
    }

    // ── Managed ──

    #[tokio::test]
    async fn test_managed_success_with_key_param() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(managed_reply("hello")))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let request = GenerationRequest::text("gemini-2.5-flash", "hi");
        let text = client
            .call_managed(&managed_config(&server), &request, Some("be nice"), None)
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_managed_sends_thinking_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "config": { "thinkingConfig": { "thinkingBudget": 2048 } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(managed_reply("ok")))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let request =
            GenerationRequest::text("gemini-3-pro-preview", "think").with_thinking_budget(2048);
        let text = client
            .call_managed(&managed_config(&server), &request, None, None)
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_managed_multipart_contents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "contents": { "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": "AAE=" } },
                    { "text": "describe" }
                ]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(managed_reply("a picture")))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let prompt = Prompt::parts(vec![
            PromptPart::Data {
                data: vec![0, 1],
                mime_type: "image/png".into(),
            },
            PromptPart::Text {
                text: "describe".into(),
            },
        ]);
        let request = GenerationRequest::new("gemini-2.5-flash", prompt);
        let text = client
            .call_managed(&managed_config(&server), &request, None, None)
            .await
            .unwrap();
        assert_eq!(text, "a picture");
    }

    #[tokio::test]
    async fn test_managed_missing_key_is_auth_error() {
        let client = ProviderClient::new();
        let config = ManagedConfig::default();
        let request = GenerationRequest::text("gemini-2.5-flash", "hi");
        let err = client
            .call_managed(&config, &request, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)));
    }

    #[tokio::test]
    async fn test_managed_malformed_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let request = GenerationRequest::text("gemini-2.5-flash", "hi");
        let err = client
            .call_managed(&managed_config(&server), &request, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    // ── Deployment ──

    #[tokio::test]
    async fn test_deployment_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deployments/gpt-4o/chat/completions"))
            .and(header("api-key", "d-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "deployed answer" } }]
            })))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let request = GenerationRequest::text("gpt-4o", "hi");
        let text = client
            .call_deployment(&deployment_config(&server), &request, Some("sys"), false)
            .await
            .unwrap();
        assert_eq!(text, "deployed answer");
    }

    #[tokio::test]
    async fn test_deployment_model_as_deployment_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deployments/claude-3-sonnet/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "ok" } }]
            })))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let mut config = deployment_config(&server);
        config.deployment.clear();
        let request = GenerationRequest::text("claude-3-sonnet", "hi");
        let text = client
            .call_deployment(&config, &request, None, false)
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_deployment_json_mode_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "response_format": { "type": "json_object" },
                "temperature": 0.2
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "{\"a\":1}" } }]
            })))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let request = GenerationRequest::text("gpt-4o", "give json");
        let text = client
            .call_deployment(&deployment_config(&server), &request, None, true)
            .await
            .unwrap();
        assert_eq!(text, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_deployment_429_is_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let request = GenerationRequest::text("gpt-4o", "hi");
        let err = client
            .call_deployment(&deployment_config(&server), &request, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn test_deployment_401_is_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let request = GenerationRequest::text("gpt-4o", "hi");
        let err = client
            .call_deployment(&deployment_config(&server), &request, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Auth(_)));
    }

    // ── Local ──

    #[tokio::test]
    async fn test_local_chat_style_with_backend_suffix() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .and(body_partial_json(json!({ "model": "llama3" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "local says hi",
                "model": "llama3:8b"
            })))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let request = GenerationRequest::text("anything", "hi");
        let text = client
            .call_local(&local_chat_config(&server), &request, Some("sys"), None)
            .await
            .unwrap();
        assert!(text.starts_with("local says hi"));
        assert!(text.contains("*[Generated via Backend (llama3:8b)]*"));
    }

    #[tokio::test]
    async fn test_local_completion_style_model_used_suffix() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_partial_json(json!({ "stream": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "completion text",
                "model_used": "mistral"
            })))
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let config = LocalConfig {
            endpoint: format!("{}/generate", server.uri()),
            default_model: "mistral".into(),
        };
        let request = GenerationRequest::text("anything", "hi");
        let text = client
            .call_local(&config, &request, None, None)
            .await
            .unwrap();
        assert!(text.starts_with("completion text"));
        assert!(text.contains("*[Processed by mistral]*"));
    }

    #[tokio::test]
    async fn test_local_fallback_suffix_when_model_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "text": "plain reply" })),
            )
            .mount(&server)
            .await;

        let client = ProviderClient::new();
        let config = LocalConfig {
            endpoint: format!("{}/generate", server.uri()),
            default_model: "llama3".into(),
        };
        let request = GenerationRequest::text("anything", "hi");
        let text = client
            .call_local(&config, &request, None, Some("llama3-custom"))
            .await
            .unwrap();
        assert!(text.contains("*[Generated via Local Fallback (llama3-custom)]*"));
    }

    #[tokio::test]
    async fn test_local_connection_refused_is_transient() {
        let client = ProviderClient::new();
        let config = LocalConfig {
            endpoint: "http://127.0.0.1:1/api/v1/chat".into(),
            default_model: "llama3".into(),
        };
        let request = GenerationRequest::text("anything", "hi");
        let err = client
            .call_local(&config, &request, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::TransientNetwork(_)));
    }
}
