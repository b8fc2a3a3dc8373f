//! Retry Policy
//!
//! Exponential backoff with random jitter for transient completion
//! failures. The semantic analyzer drives the retry loop; this module owns
//! the delay arithmetic so cross-batch behavior stays uniform.

use std::time::Duration;

use rand::Rng;

use crate::constants::retry as retry_constants;
use crate::types::CompletionError;

/// Backoff parameters for one batch's retry loop
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt
    pub max_retries: u8,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(retry_constants::MAX_DELAY_SECS),
            backoff_factor: retry_constants::BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Delay before retry number `attempt` (1-based), with jitter.
    ///
    /// Rate-limit errors carry their own suggested wait which takes
    /// precedence over the computed backoff.
    pub fn delay_for(&self, attempt: u8, error: &CompletionError) -> Duration {
        if let Some(wait) = error.retry_after {
            return cap_wait(wait);
        }
        if let Some(wait) = parse_rate_limit_delay(&error.message) {
            return cap_wait(wait);
        }

        let mut delay = self.base_delay;
        for _ in 1..attempt {
            delay = calculate_backoff(delay, self.backoff_factor, self.max_delay);
        }
        delay + random_jitter(delay)
    }
}

fn cap_wait(wait: Duration) -> Duration {
    std::cmp::min(
        wait,
        Duration::from_secs(retry_constants::MAX_RATE_LIMIT_WAIT_SECS),
    )
}

/// Calculate exponential backoff with cap
fn calculate_backoff(current: Duration, factor: f32, max: Duration) -> Duration {
    let next = Duration::from_secs_f32(current.as_secs_f32() * factor);
    std::cmp::min(next, max)
}

/// Generate random jitter using thread-local RNG
fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = (base_delay.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rand::rng().random_range(0..max_jitter_ms);
    Duration::from_millis(jitter_ms)
}

/// Parse rate limit delay from error message
///
/// Extracts retry-after seconds from common rate limit error formats.
fn parse_rate_limit_delay(message: &str) -> Option<Duration> {
    let lower = message.to_lowercase();

    // Pattern: "retry after N seconds" or "retry-after: N"
    if let Some(idx) = lower.find("retry") {
        let after_retry = &lower[idx..];
        for word in after_retry.split_whitespace() {
            if let Ok(secs) = word.parse::<u64>() {
                return Some(Duration::from_secs(
                    secs.min(retry_constants::MAX_RATE_LIMIT_WAIT_SECS),
                ));
            }
        }
    }

    // Pattern: "wait N seconds" or "in N seconds"
    for pattern in &["wait ", "in "] {
        if let Some(idx) = lower.find(pattern) {
            let after_pattern = &lower[idx + pattern.len()..];
            for word in after_pattern.split_whitespace() {
                if let Ok(secs) = word.parse::<u64>() {
                    return Some(Duration::from_secs(
                        secs.min(retry_constants::MAX_RATE_LIMIT_WAIT_SECS),
                    ));
                }
            }
        }
    }

    None
}
