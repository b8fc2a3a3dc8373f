//! OpenAI-Compatible Completion Provider
//!
//! Implements the completion capability against an OpenAI-style Chat
//! Completions endpoint. Errors are classified into completion categories
//! here so the analyzer's retry policy can route on them.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::completion::{CompletionOptions, CompletionProvider};
use crate::config::CompletionConfig;
use crate::constants::network::CONNECTION_TIMEOUT_SECS;
use crate::types::{CompletionError, CompletionErrorKind, ErrorClassifier, Result, SnapError};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider with secure API key handling
pub struct OpenAiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let api_key_str = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                SnapError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY env var or provide in config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        // Per-request timeouts come from CompletionOptions; the client only
        // bounds connection establishment
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| SnapError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key_str),
            api_base,
            model: config.model,
            client,
        })
    }

    fn build_request(&self, prompt: &str, options: &CompletionOptions) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are a software architecture analyst. \
                              Always respond with a single valid JSON object, no markdown, no commentary."
                        .to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: options.temperature,
            max_tokens: Some(options.max_tokens),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> std::result::Result<String, CompletionError> {
        let request = self.build_request(prompt, options);
        let url = format!("{}/chat/completions", self.api_base);

        debug!(model = %self.model, "sending completion request");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::with_provider(
                        CompletionErrorKind::Timeout,
                        format!("request timed out: {}", e),
                        self.name(),
                    )
                } else if e.is_connect() {
                    CompletionError::with_provider(
                        CompletionErrorKind::ServerError,
                        format!("connection failed: {}", e),
                        self.name(),
                    )
                } else {
                    ErrorClassifier::classify(&e.to_string(), self.name())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "completion request failed");
            return Err(ErrorClassifier::classify_http_status(
                status,
                &body,
                self.name(),
            ));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            CompletionError::with_provider(
                CompletionErrorKind::Malformed,
                format!("unparseable response body: {}", e),
                self.name(),
            )
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CompletionError::with_provider(
                    CompletionErrorKind::Malformed,
                    "no content in completion response",
                    self.name(),
                )
            })
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_config_error() {
        // SAFETY: test runs in isolation
        unsafe {
            std::env::remove_var("OPENAI_API_KEY");
        }
        let config = CompletionConfig::default();
        let result = OpenAiProvider::new(config);
        assert!(matches!(result, Err(SnapError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let mut config = CompletionConfig::default();
        config.api_key = Some("sk-secret".to_string());
        let provider = OpenAiProvider::new(config).unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
