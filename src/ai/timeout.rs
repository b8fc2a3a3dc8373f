//! Unified Timeout Configuration
//!
//! Provides a centralized timeout management system with:
//! - Operation-specific timeout defaults
//! - Helper function for wrapping async operations
//! - Consistent timeout error handling

use std::future::Future;
use std::time::Duration;

use crate::constants::network as net_constants;
use crate::types::{Result, SnapError};

/// Unified timeout configuration for all operations
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for one completion request (default: 5 minutes)
    pub completion_request: Duration,
    /// Timeout for file I/O operations (default: 30 seconds)
    pub file_io: Duration,
    /// Overall Pass 2 run deadline (default: 30 minutes)
    pub run_deadline: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            completion_request: Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS),
            file_io: Duration::from_secs(30),
            run_deadline: Duration::from_secs(net_constants::DEFAULT_RUN_DEADLINE_SECS),
        }
    }
}

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the
/// specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(SnapError::timeout(operation_name, timeout)),
    }
}

/// Execute an async operation with a timeout, wrapping non-Result futures
pub async fn with_timeout_map<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(SnapError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_defaults() {
        let config = TimeoutConfig::default();
        assert_eq!(config.completion_request.as_secs(), 300);
        assert_eq!(config.run_deadline.as_secs(), 1800);
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, SnapError>(42) },
            "test operation",
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, SnapError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), SnapError::Timeout { .. }));
    }
}
