//! AI Integration Layer
//!
//! The completion capability consumed by Pass 2: provider abstraction,
//! retry/backoff arithmetic, timeouts, and model-output extraction.

pub mod completion;
pub mod extract;
pub mod openai;
pub mod retry;
pub mod timeout;

pub use completion::{
    CompletionOptions, CompletionProvider, SharedCompletion, create_provider,
};
pub use extract::{extract_first_json_object, looks_truncated, parse_json_object};
pub use openai::OpenAiProvider;
pub use retry::RetryPolicy;
pub use timeout::{TimeoutConfig, with_timeout, with_timeout_map};
