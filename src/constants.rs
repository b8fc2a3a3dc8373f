//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Static scanner constants
pub mod scan {
    /// Maximum file size to index in full (1MB); larger files are recorded
    /// as binary entries with empty symbol lists
    pub const MAX_FILE_BYTES: u64 = 1_048_576;

    /// Bytes sniffed from the head of a file for binary detection
    pub const BINARY_SNIFF_BYTES: usize = 512;

    /// Maximum symbols kept per file (import and export lists each)
    pub const MAX_SYMBOLS_PER_FILE: usize = 256;
}

/// Retry/backoff constants for the completion capability
pub mod retry {
    /// Default maximum retries per batch
    pub const DEFAULT_MAX_RETRIES: u8 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Rate-limit waits parsed from error messages are capped here (seconds)
    pub const MAX_RATE_LIMIT_WAIT_SECS: u64 = 300;
}

/// Semantic analysis batch constants
pub mod batch {
    /// Default per-batch content budget (bytes of embedded file content)
    pub const DEFAULT_MAX_BATCH_BYTES: usize = 96_000;

    /// Default maximum files per batch
    pub const DEFAULT_MAX_FILES_PER_BATCH: usize = 24;

    /// Default concurrent batch workers
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// Per-file content excerpt cap inside a prompt (bytes)
    pub const MAX_CHARS_PER_FILE: usize = 9_000;
}

/// HTTP/Network constants
pub mod network {
    /// Default completion request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

    /// Overall Pass 2 run deadline (seconds)
    pub const DEFAULT_RUN_DEADLINE_SECS: u64 = 1_800;
}
