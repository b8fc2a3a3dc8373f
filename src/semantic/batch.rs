//! Batch Planning
//!
//! Groups indexed files into analysis batches bounded by a size budget.
//! Default grouping is by top-level directory, falling back to fixed-size
//! chunking when a directory exceeds the budget. Planning is deterministic:
//! the same index and config always produce the same batch sequence.

use std::time::Duration;

use crate::config::{AnalysisConfig, CompletionConfig};
use crate::constants::batch as batch_constants;
use crate::types::{RepoIndex, SemanticTarget};

/// Limits governing Pass 2 batching and execution
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Per-batch record budget (serialized bytes)
    pub max_batch_bytes: usize,
    /// Maximum files per batch
    pub max_files_per_batch: usize,
    /// Concurrent batch workers
    pub concurrency: usize,
    /// Maximum retries per batch for transient failures
    pub max_retries: u8,
    /// Per-completion-call timeout
    pub per_call_timeout: Duration,
    /// Overall deadline for the whole analysis stage
    pub run_deadline: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_bytes: batch_constants::DEFAULT_MAX_BATCH_BYTES,
            max_files_per_batch: batch_constants::DEFAULT_MAX_FILES_PER_BATCH,
            concurrency: batch_constants::DEFAULT_CONCURRENCY,
            max_retries: crate::constants::retry::DEFAULT_MAX_RETRIES,
            per_call_timeout: Duration::from_secs(
                crate::constants::network::DEFAULT_TIMEOUT_SECS,
            ),
            run_deadline: Duration::from_secs(
                crate::constants::network::DEFAULT_RUN_DEADLINE_SECS,
            ),
        }
    }
}

impl BatchConfig {
    /// Build from the analysis and completion config sections
    pub fn from_config(analysis: &AnalysisConfig, completion: &CompletionConfig) -> Self {
        Self {
            max_batch_bytes: analysis.max_batch_bytes,
            max_files_per_batch: analysis.max_files_per_batch,
            concurrency: analysis.concurrency,
            max_retries: analysis.max_retries,
            per_call_timeout: Duration::from_secs(completion.timeout_secs),
            run_deadline: analysis.run_deadline(),
        }
    }
}

/// One unit of Pass 2 work: a module group's files (or a chunk of them)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Position in the deterministic batch sequence
    pub id: usize,
    pub target: SemanticTarget,
    /// Relative paths, in index (sorted) order
    pub files: Vec<String>,
}

/// Plan the batch sequence for an index.
///
/// Only indexed text files participate; binary/unreadable records are
/// visible to the model through the file index document instead.
pub fn plan_batches(index: &RepoIndex, config: &BatchConfig) -> Vec<Batch> {
    let mut batches = Vec::new();

    for dir in index.top_level_dirs() {
        let mut current_files: Vec<String> = Vec::new();
        let mut current_bytes = 0usize;

        for (path, record) in &index.files {
            if !record.is_indexed_text() || top_level_of(path) != dir {
                continue;
            }

            let cost = record_cost(record);
            let over_budget = !current_files.is_empty()
                && (current_files.len() >= config.max_files_per_batch
                    || current_bytes + cost > config.max_batch_bytes);

            if over_budget {
                batches.push(Batch {
                    id: batches.len(),
                    target: SemanticTarget::Group(dir.clone()),
                    files: std::mem::take(&mut current_files),
                });
                current_bytes = 0;
            }

            current_files.push(path.clone());
            current_bytes += cost;
        }

        if !current_files.is_empty() {
            batches.push(Batch {
                id: batches.len(),
                target: SemanticTarget::Group(dir.clone()),
                files: current_files,
            });
        }
    }

    batches
}

fn top_level_of(path: &str) -> &str {
    if path.contains('/') {
        path.split('/').next().unwrap_or("")
    } else {
        ""
    }
}

/// Serialized footprint of one record inside a prompt
fn record_cost(record: &crate::types::FileRecord) -> usize {
    serde_json::to_string(record).map(|s| s.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileRecord;

    fn index_with(paths: &[&str]) -> RepoIndex {
        let mut index = RepoIndex::default();
        for path in paths {
            index.files.insert(
                path.to_string(),
                FileRecord {
                    relative_path: path.to_string(),
                    size_bytes: 100,
                    language_guess: "rust".to_string(),
                    content_hash: "h".to_string(),
                    imported_symbols: vec![],
                    exported_symbols: vec![],
                },
            );
        }
        index
    }

    #[test]
    fn test_groups_by_top_level_dir() {
        let index = index_with(&["src/a.rs", "src/b.rs", "docs/x.md", "README.md"]);
        let batches = plan_batches(&index, &BatchConfig::default());

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].target, SemanticTarget::Group(String::new()));
        assert_eq!(batches[0].files, vec!["README.md"]);
        assert_eq!(batches[1].target, SemanticTarget::Group("docs".into()));
        assert_eq!(batches[2].target, SemanticTarget::Group("src".into()));
        assert_eq!(batches[2].files, vec!["src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn test_oversized_group_chunks() {
        let paths: Vec<String> = (0..10).map(|i| format!("src/f{:02}.rs", i)).collect();
        let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        let index = index_with(&refs);

        let config = BatchConfig {
            max_files_per_batch: 4,
            ..Default::default()
        };
        let batches = plan_batches(&index, &config);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].files.len(), 4);
        assert_eq!(batches[1].files.len(), 4);
        assert_eq!(batches[2].files.len(), 2);
        // Chunks of one directory share the group target
        for batch in &batches {
            assert_eq!(batch.target, SemanticTarget::Group("src".into()));
        }
    }

    #[test]
    fn test_byte_budget_chunks() {
        let index = index_with(&["src/a.rs", "src/b.rs", "src/c.rs"]);
        let config = BatchConfig {
            // Smaller than two records, bigger than one
            max_batch_bytes: 200,
            ..Default::default()
        };
        let batches = plan_batches(&index, &config);

        assert_eq!(batches.len(), 3);
        for batch in &batches {
            assert_eq!(batch.files.len(), 1);
        }
    }

    #[test]
    fn test_binary_files_excluded() {
        let mut index = index_with(&["src/a.rs"]);
        index
            .files
            .insert("src/blob.bin".to_string(), FileRecord::binary("src/blob.bin", 10));

        let batches = plan_batches(&index, &BatchConfig::default());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].files, vec!["src/a.rs"]);
    }

    #[test]
    fn test_planning_is_deterministic() {
        let index = index_with(&["src/a.rs", "src/b.rs", "lib/c.rs"]);
        let config = BatchConfig::default();

        assert_eq!(plan_batches(&index, &config), plan_batches(&index, &config));
    }

    #[test]
    fn test_batch_ids_sequential() {
        let index = index_with(&["a/x.rs", "b/y.rs", "c/z.rs"]);
        let batches = plan_batches(&index, &BatchConfig::default());
        let ids: Vec<usize> = batches.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
