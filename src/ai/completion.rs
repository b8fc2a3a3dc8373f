//! Completion Capability
//!
//! The abstract external operation that turns a prompt into model-generated
//! text. The pipeline treats this as opaque: retry/backoff policy lives in
//! the semantic analyzer, not here. Providers return raw text or a
//! classified `CompletionError`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::CompletionConfig;
use crate::types::{CompletionError, Result, SnapError};

/// Options for one completion call
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.0,
            timeout: Duration::from_secs(crate::constants::network::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl CompletionOptions {
    /// Options derived from provider configuration
    pub fn from_config(config: &CompletionConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Completion provider trait
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Turn a prompt into model-generated text
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> std::result::Result<String, CompletionError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Shared completion provider for concurrent access across batch workers
pub type SharedCompletion = Arc<dyn CompletionProvider + Send + Sync>;

/// Create a shared provider from configuration
pub fn create_provider(config: &CompletionConfig) -> Result<SharedCompletion> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(super::openai::OpenAiProvider::new(
            config.clone(),
        )?)),
        _ => Err(SnapError::Config(format!(
            "Unknown completion provider: {}. Supported: openai",
            config.provider
        ))),
    }
}
