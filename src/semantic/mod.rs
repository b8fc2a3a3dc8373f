//! Semantic Analyzer (Pass 2)
//!
//! LLM-backed stage producing structured summaries per module group.
//! Batches are independent: workers share only the read-only index and
//! graph, and each writes its own record slot, so one bad batch never
//! fails the run.
//!
//! ## Failure Policy
//!
//! - Transient completion failures (timeout, rate limit, 5xx) retry with
//!   exponential backoff and jitter up to a bounded count
//! - Auth/malformed failures are recorded immediately as salvage records
//! - Parse failures produce salvage records carrying the raw model text
//! - Deadline expiry marks outstanding batches as timed-out salvage
//!   records; nothing is silently dropped

pub mod batch;
pub mod prompt;

pub use batch::{Batch, BatchConfig, plan_batches};
pub use prompt::build_prompt;

use futures::stream::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::ai::{CompletionOptions, RetryPolicy, SharedCompletion, parse_json_object};
use crate::types::{
    CompletionError, CompletionErrorKind, DependencyGraph, RepoIndex, SemanticRecord,
    SemanticTarget, StageOutcome,
};

/// Result of the full Pass 2 stage
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// One record per batch, in batch-plan order
    pub records: Vec<SemanticRecord>,
    pub batches_total: usize,
    pub batches_succeeded: usize,
}

impl AnalysisOutcome {
    /// Stage result: `ok` if at least one batch succeeded, `failed` only if
    /// every batch failed outright.
    pub fn stage_outcome(&self) -> StageOutcome {
        if self.batches_total == 0 || self.batches_succeeded == self.batches_total {
            StageOutcome::Ok
        } else if self.batches_succeeded > 0 {
            StageOutcome::Partial
        } else {
            StageOutcome::Failed
        }
    }
}

/// Pass 2 orchestration over a bounded worker pool
pub struct SemanticAnalyzer {
    provider: SharedCompletion,
    options: CompletionOptions,
    config: BatchConfig,
    retry: RetryPolicy,
}

impl SemanticAnalyzer {
    pub fn new(provider: SharedCompletion, options: CompletionOptions, config: BatchConfig) -> Self {
        let retry = RetryPolicy::default().with_max_retries(config.max_retries);
        Self {
            provider,
            options,
            config,
            retry,
        }
    }

    /// Override retry timing (tests use near-zero delays)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run semantic analysis over the frozen index and graph.
    #[instrument(skip(self, index, graph), fields(files = index.len()))]
    pub async fn analyze(&self, index: &RepoIndex, graph: &DependencyGraph) -> AnalysisOutcome {
        let batches = plan_batches(index, &self.config);
        let total = batches.len();
        info!(
            batches = total,
            concurrency = self.config.concurrency,
            "semantic analysis starting"
        );

        let deadline = tokio::time::Instant::now() + self.config.run_deadline;

        let mut indexed: Vec<(usize, SemanticRecord)> = futures::stream::iter(batches)
            .map(|batch| {
                let prompt = build_prompt(&batch, index, graph);
                async move {
                    let id = batch.id;
                    let record = self.process_batch(batch, prompt, deadline).await;
                    (id, record)
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        // Workers finish in arbitrary order; records keep batch-plan order
        indexed.sort_by_key(|(id, _)| *id);
        let records: Vec<SemanticRecord> = indexed.into_iter().map(|(_, r)| r).collect();

        let succeeded = records.iter().filter(|r| r.ok).count();
        info!(
            succeeded,
            salvaged = total - succeeded,
            "semantic analysis complete"
        );

        AnalysisOutcome {
            records,
            batches_total: total,
            batches_succeeded: succeeded,
        }
    }

    /// Process one batch to a record. Never errors: every failure mode ends
    /// in a salvage record.
    async fn process_batch(
        &self,
        batch: Batch,
        prompt: String,
        deadline: tokio::time::Instant,
    ) -> SemanticRecord {
        let target = batch.target.clone();
        let mut attempt: u8 = 0;

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                warn!(batch = batch.id, "run deadline exceeded");
                return SemanticRecord::salvage(
                    target,
                    "",
                    "run deadline exceeded before batch completed",
                );
            }

            let call_timeout = (deadline - now).min(self.config.per_call_timeout);
            let completion = match tokio::time::timeout(
                call_timeout,
                self.provider.complete(&prompt, &self.options),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(CompletionError::with_provider(
                    CompletionErrorKind::Timeout,
                    format!("completion call exceeded {:?}", call_timeout),
                    self.provider.name(),
                )),
            };

            match completion {
                Ok(text) => return record_from_output(target, text),
                Err(err) => {
                    if err.is_transient() && attempt < self.config.max_retries {
                        attempt += 1;
                        let delay = self.retry.delay_for(attempt, &err);
                        debug!(
                            batch = batch.id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "retrying after backoff"
                        );
                        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                        tokio::time::sleep(delay.min(remaining)).await;
                        continue;
                    }

                    warn!(batch = batch.id, error = %err, "batch failed");
                    return SemanticRecord::salvage(target, "", err.to_string());
                }
            }
        }
    }
}

/// Parse model output into a record; parse failure yields a salvage record
/// holding the raw text.
fn record_from_output(target: SemanticTarget, raw: String) -> SemanticRecord {
    match parse_json_object(&raw) {
        Ok(value) => {
            let summary = value
                .get("summary")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim()
                .to_string();
            let risks = value
                .get("risks")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();

            SemanticRecord {
                target,
                summary,
                risks,
                raw_model_output: raw,
                ok: true,
                parse_error: None,
            }
        }
        Err(parse_error) => SemanticRecord::salvage(target, raw, parse_error),
    }
}
