//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/reposnap/) and project (.reposnap/) level
//! configuration; CLI flags override everything here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{batch, network, retry, scan};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Static scanner settings
    pub scan: ScanConfig,

    /// Semantic analysis (Pass 2) settings
    pub analysis: AnalysisConfig,

    /// Completion provider settings
    pub completion: CompletionConfig,

    /// Remote mirror settings
    pub upload: UploadConfig,

    /// Output settings
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            scan: ScanConfig::default(),
            analysis: AnalysisConfig::default(),
            completion: CompletionConfig::default(),
            upload: UploadConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `SnapError::Config` on validation failure.
    pub fn validate(&self) -> crate::types::Result<()> {
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(crate::types::SnapError::Config(format!(
                "completion temperature must be between 0.0 and 2.0, got {}",
                self.completion.temperature
            )));
        }

        if self.completion.timeout_secs == 0 {
            return Err(crate::types::SnapError::Config(
                "completion timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.analysis.concurrency == 0 {
            return Err(crate::types::SnapError::Config(
                "analysis concurrency must be greater than 0".to_string(),
            ));
        }

        if self.analysis.max_batch_bytes == 0 || self.analysis.max_files_per_batch == 0 {
            return Err(crate::types::SnapError::Config(
                "analysis batch limits must be greater than 0".to_string(),
            ));
        }

        if self.upload.enabled && self.upload.endpoint.is_none() {
            return Err(crate::types::SnapError::Config(
                "upload enabled but no endpoint configured".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Scanner Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Glob patterns of paths to include (empty = everything)
    pub include: Vec<String>,
    /// Glob patterns of paths to exclude
    pub exclude: Vec<String>,
    /// Files larger than this are recorded as binary, not indexed
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: vec![
                "node_modules/**".to_string(),
                "target/**".to_string(),
                ".git/**".to_string(),
                "dist/**".to_string(),
                "build/**".to_string(),
                "__pycache__/**".to_string(),
                "vendor/**".to_string(),
                ".venv/**".to_string(),
            ],
            max_file_bytes: scan::MAX_FILE_BYTES,
        }
    }
}

// =============================================================================
// Analysis (Pass 2) Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Per-batch embedded content budget (bytes)
    pub max_batch_bytes: usize,
    /// Maximum files per batch
    pub max_files_per_batch: usize,
    /// Concurrent batch workers
    pub concurrency: usize,
    /// Maximum retries per batch for transient completion failures
    pub max_retries: u8,
    /// Overall Pass 2 deadline (seconds)
    pub run_deadline_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_batch_bytes: batch::DEFAULT_MAX_BATCH_BYTES,
            max_files_per_batch: batch::DEFAULT_MAX_FILES_PER_BATCH,
            concurrency: batch::DEFAULT_CONCURRENCY,
            max_retries: retry::DEFAULT_MAX_RETRIES,
            run_deadline_secs: network::DEFAULT_RUN_DEADLINE_SECS,
        }
    }
}

impl AnalysisConfig {
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}

// =============================================================================
// Completion Provider Configuration
// =============================================================================

/// Configuration for the completion capability
///
/// Note: API keys are handled securely - they are never serialized to output.
/// The provider converts the key to SecretString internally.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Provider type: "openai" (OpenAI-compatible chat completions)
    pub provider: String,
    /// Model name (provider-specific)
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// API key; never serialized to output for security
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4.1-mini".to_string(),
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
            max_tokens: 4096,
            api_key: None,
            api_base: None,
        }
    }
}

// =============================================================================
// Upload Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Mirror finished bundles to the remote store
    pub enabled: bool,
    /// Base URL of the object store
    pub endpoint: Option<String>,
    /// Bearer token; never serialized to output
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
}

// =============================================================================
// Output Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for run bundles
    pub root: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".reposnap/snapshots"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_temperature_validation() {
        let mut config = Config::default();
        config.completion.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.analysis.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upload_requires_endpoint() {
        let mut config = Config::default();
        config.upload.enabled = true;
        assert!(config.validate().is_err());

        config.upload.endpoint = Some("https://mirror.example.com/snapshots".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = CompletionConfig::default();
        config.api_key = Some("secret-key".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-key"));
    }
}
