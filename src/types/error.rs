//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides completion-error classification for retry and salvage decisions.
//!
//! ## Error Categories
//!
//! - **Timeout**: completion call exceeded its deadline (retry)
//! - **RateLimited**: API rate limiting (wait and retry)
//! - **ServerError**: 5xx-equivalent provider issues (retry with backoff)
//! - **Auth**: authentication failures (salvage immediately, don't retry)
//! - **Malformed**: invalid request or unparseable response (salvage immediately)
//!
//! ## Design Principles
//!
//! - Single unified error type (SnapError) for the entire application
//! - Structured error variants with context for better debugging
//! - Category-based routing for retry decisions in the semantic analyzer
//! - No panic/unwrap - fatal errors surface through RunResult

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Completion Error Categories
// =============================================================================

/// Failure categories for the remote completion capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// Request exceeded its per-call timeout - retry
    Timeout,
    /// Rate limited - wait then retry
    RateLimited,
    /// Authentication failed - fail fast, don't retry
    Auth,
    /// Temporary server-side failure (5xx-equivalent) - retry with backoff
    ServerError,
    /// Malformed request or unusable response - don't retry
    Malformed,
}

impl std::fmt::Display for CompletionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::Auth => write!(f, "AUTH"),
            Self::ServerError => write!(f, "SERVER_ERROR"),
            Self::Malformed => write!(f, "MALFORMED"),
        }
    }
}

impl CompletionErrorKind {
    /// Check if this category is retryable with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::ServerError)
    }

    /// Get recommended retry delay for this category
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::RateLimited => Duration::from_secs(30),
            Self::ServerError => Duration::from_secs(5),
            Self::Timeout => Duration::from_secs(2),
            _ => Duration::from_millis(500),
        }
    }
}

// =============================================================================
// Completion Error
// =============================================================================

/// Unified completion-capability error with category, context, and retry hints
#[derive(Debug, Clone)]
pub struct CompletionError {
    /// Error category for retry decisions
    pub kind: CompletionErrorKind,
    /// Detailed error message
    pub message: String,
    /// Provider that produced the error
    pub provider: Option<String>,
    /// Suggested wait time before retry (if applicable)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.kind, self.message)
        } else {
            write!(f, "[{}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for CompletionError {}

impl CompletionError {
    /// Create a new completion error
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    /// Create error with provider context
    pub fn with_provider(
        kind: CompletionErrorKind,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    /// Check if the error is retryable with backoff
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Get recommended retry delay
    pub fn recommended_delay(&self) -> Duration {
        self.retry_after
            .unwrap_or_else(|| self.kind.recommended_delay())
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Classifier mapping raw provider failures into completion categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> CompletionError {
        let lower = message.to_lowercase();

        // Rate limiting patterns
        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return CompletionError::with_provider(
                CompletionErrorKind::RateLimited,
                message,
                provider,
            )
            .retry_after(Duration::from_secs(30));
        }

        // Authentication patterns
        if lower.contains("auth")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("invalid key")
            || lower.contains("unauthorized")
            || lower.contains("permission denied")
        {
            return CompletionError::with_provider(CompletionErrorKind::Auth, message, provider);
        }

        // Timeout patterns
        if lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("deadline")
        {
            return CompletionError::with_provider(CompletionErrorKind::Timeout, message, provider)
                .retry_after(Duration::from_secs(2));
        }

        // Server-side patterns
        if lower.contains("500")
            || lower.contains("502")
            || lower.contains("503")
            || lower.contains("504")
            || lower.contains("server error")
            || lower.contains("internal error")
            || lower.contains("service unavailable")
            || lower.contains("overloaded")
            || lower.contains("connection")
            || lower.contains("network")
            || lower.contains("unreachable")
        {
            return CompletionError::with_provider(
                CompletionErrorKind::ServerError,
                message,
                provider,
            )
            .retry_after(Duration::from_secs(5));
        }

        // Everything else is a malformed request/response
        CompletionError::with_provider(CompletionErrorKind::Malformed, message, provider)
    }

    /// Classify HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> CompletionError {
        match status {
            429 => {
                CompletionError::with_provider(CompletionErrorKind::RateLimited, message, provider)
                    .retry_after(Duration::from_secs(30))
            }
            401 | 403 => {
                CompletionError::with_provider(CompletionErrorKind::Auth, message, provider)
            }
            408 | 504 => {
                CompletionError::with_provider(CompletionErrorKind::Timeout, message, provider)
                    .retry_after(Duration::from_secs(2))
            }
            500 | 502 | 503 => {
                CompletionError::with_provider(CompletionErrorKind::ServerError, message, provider)
                    .retry_after(Duration::from_secs(5))
            }
            _ => CompletionError::with_provider(CompletionErrorKind::Malformed, message, provider),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum SnapError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Stage Errors
    // -------------------------------------------------------------------------
    /// Working tree could not be obtained - the run never starts
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// Root path unreadable or walk-level filesystem failure - fatal
    #[error("Scan error: {0}")]
    Scan(String),

    /// Structured completion-capability error
    #[error("Completion error: {0}")]
    Completion(CompletionError),

    /// Validation errors block artifact finalization
    #[error("Validation failed with {} error(s)", .errors.len())]
    Validation { errors: Vec<String> },

    /// Partial writes must remain invisible - fatal
    #[error("Write error: {0}")]
    Write(String),

    /// Upload failures are recorded as warnings, never fatal
    #[error("Upload error: {0}")]
    Upload(String),

    /// Pipeline stage error with originating stage context
    #[error("Pipeline error in stage {stage}: {message}")]
    Pipeline { stage: String, message: String },

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Config error: {0}")]
    Config(String),
}

impl From<CompletionError> for SnapError {
    fn from(err: CompletionError) -> Self {
        SnapError::Completion(err)
    }
}

pub type Result<T> = std::result::Result<T, SnapError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl SnapError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a pipeline error
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Check whether this error aborts the state machine
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Completion(_) | Self::Upload(_) => false,
            Self::Timeout { .. } => false,
            _ => true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(CompletionErrorKind::RateLimited.to_string(), "RATE_LIMITED");
        assert_eq!(CompletionErrorKind::Auth.to_string(), "AUTH");
        assert_eq!(CompletionErrorKind::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn test_kind_transience() {
        assert!(CompletionErrorKind::Timeout.is_transient());
        assert!(CompletionErrorKind::RateLimited.is_transient());
        assert!(CompletionErrorKind::ServerError.is_transient());
        assert!(!CompletionErrorKind::Auth.is_transient());
        assert!(!CompletionErrorKind::Malformed.is_transient());
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = ErrorClassifier::classify("Rate limit exceeded, please retry", "openai");
        assert_eq!(err.kind, CompletionErrorKind::RateLimited);
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_auth() {
        let err = ErrorClassifier::classify("Invalid API key provided", "openai");
        assert_eq!(err.kind, CompletionErrorKind::Auth);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classify_timeout() {
        let err = ErrorClassifier::classify("Connection timed out after 30s", "openai");
        assert_eq!(err.kind, CompletionErrorKind::Timeout);
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_server_error() {
        let err = ErrorClassifier::classify("Service unavailable (503)", "openai");
        assert_eq!(err.kind, CompletionErrorKind::ServerError);
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_malformed_fallback() {
        let err = ErrorClassifier::classify("Something weird happened", "test");
        assert_eq!(err.kind, CompletionErrorKind::Malformed);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classify_http_status() {
        let rate_limit = ErrorClassifier::classify_http_status(429, "Rate limited", "test");
        assert_eq!(rate_limit.kind, CompletionErrorKind::RateLimited);

        let auth = ErrorClassifier::classify_http_status(401, "Unauthorized", "test");
        assert_eq!(auth.kind, CompletionErrorKind::Auth);

        let server = ErrorClassifier::classify_http_status(500, "Server error", "test");
        assert_eq!(server.kind, CompletionErrorKind::ServerError);

        let gateway_timeout = ErrorClassifier::classify_http_status(504, "Gateway timeout", "test");
        assert_eq!(gateway_timeout.kind, CompletionErrorKind::Timeout);
    }

    #[test]
    fn test_recommended_delay() {
        let rate_limit = CompletionError::new(CompletionErrorKind::RateLimited, "test");
        assert!(rate_limit.recommended_delay() >= Duration::from_secs(30));

        let custom = CompletionError::new(CompletionErrorKind::ServerError, "test")
            .retry_after(Duration::from_secs(100));
        assert_eq!(custom.recommended_delay(), Duration::from_secs(100));
    }

    #[test]
    fn test_completion_error_display() {
        let err = CompletionError::with_provider(
            CompletionErrorKind::RateLimited,
            "Too many requests",
            "openai",
        );
        assert_eq!(err.to_string(), "[openai:RATE_LIMITED] Too many requests");

        let err_no_provider =
            CompletionError::new(CompletionErrorKind::ServerError, "Connection failed");
        assert_eq!(
            err_no_provider.to_string(),
            "[SERVER_ERROR] Connection failed"
        );
    }

    #[test]
    fn test_fatality() {
        assert!(SnapError::Scan("bad root".into()).is_fatal());
        assert!(SnapError::Write("rename failed".into()).is_fatal());
        assert!(!SnapError::Upload("put failed".into()).is_fatal());
        assert!(
            !SnapError::Completion(CompletionError::new(CompletionErrorKind::Timeout, "t"))
                .is_fatal()
        );
    }
}
