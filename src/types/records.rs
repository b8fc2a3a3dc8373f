//! Pipeline Data Model
//!
//! The write-once record types that flow between stages: each stage consumes
//! the previous stage's frozen output and produces its own. Sorted-map keys
//! keep every serialization deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Pass 1: File Records and Repo Index
// =============================================================================

/// Language guess recorded for files skipped as binary/oversized
pub const LANGUAGE_BINARY: &str = "binary";
/// Language guess recorded for files that could not be read
pub const LANGUAGE_UNREADABLE: &str = "unreadable";

/// One scanned file. Produced by the static scanner, read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub relative_path: String,
    pub size_bytes: u64,
    /// Extension-based guess; `"binary"` / `"unreadable"` are sentinels
    pub language_guess: String,
    /// SHA-256 of file content, for change detection across runs
    pub content_hash: String,
    pub imported_symbols: Vec<String>,
    pub exported_symbols: Vec<String>,
}

impl FileRecord {
    /// Record for a file skipped as binary or oversized
    pub fn binary(relative_path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            size_bytes,
            language_guess: LANGUAGE_BINARY.to_string(),
            content_hash: String::new(),
            imported_symbols: Vec::new(),
            exported_symbols: Vec::new(),
        }
    }

    /// Record for a file that could not be read
    pub fn unreadable(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            size_bytes: 0,
            language_guess: LANGUAGE_UNREADABLE.to_string(),
            content_hash: String::new(),
            imported_symbols: Vec::new(),
            exported_symbols: Vec::new(),
        }
    }

    pub fn is_indexed_text(&self) -> bool {
        self.language_guess != LANGUAGE_BINARY && self.language_guess != LANGUAGE_UNREADABLE
    }
}

/// Scan counters carried alongside the index
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanCounts {
    pub files_scanned: u64,
    pub files_included: u64,
    pub files_skipped: u64,
    pub total_bytes_included: u64,
}

/// Authoritative file manifest for one run.
///
/// BTreeMap keys give unique paths and sorted, reproducible iteration order.
/// Owned by Pass 1; later stages see it as a read-only snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoIndex {
    pub files: BTreeMap<String, FileRecord>,
    pub counts: ScanCounts,
}

impl RepoIndex {
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sorted top-level directory names (`""` for root-level files)
    pub fn top_level_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self
            .files
            .keys()
            .map(|p| p.split('/').next().filter(|_| p.contains('/')).unwrap_or(""))
            .map(String::from)
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

// =============================================================================
// Dependency Graph
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Import spec resolved to another indexed file
    Import,
    /// Non-import reference resolved to another indexed file
    Reference,
    /// Import spec that matched no resolution rule; retained, never dropped
    Unresolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEdge {
    pub from_path: String,
    /// For unresolved edges this holds the raw import spec
    pub to_path: String,
    pub kind: EdgeKind,
}

impl DependencyEdge {
    pub fn is_resolved(&self) -> bool {
        !matches!(self.kind, EdgeKind::Unresolved)
    }
}

/// Directed intra-repo reference graph derived from the index
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Ordered edge list (sorted by from_path, then to_path)
    pub edges: Vec<DependencyEdge>,
    /// Cycles over the resolved-edge subgraph; reported, not errors
    pub cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn resolved_edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(|e| e.is_resolved())
    }

    pub fn unresolved_edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(|e| !e.is_resolved())
    }

    /// Outgoing resolved edges for one file, in edge order
    pub fn edges_from<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a DependencyEdge> {
        self.edges
            .iter()
            .filter(move |e| e.from_path == path && e.is_resolved())
    }
}

// =============================================================================
// Pass 2: Semantic Records
// =============================================================================

/// What a semantic record describes: a single file or a module group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum SemanticTarget {
    File(String),
    /// Top-level directory group, e.g. `"src"`; root-level files group as `""`
    Group(String),
}

impl std::fmt::Display for SemanticTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(p) => write!(f, "{}", p),
            Self::Group(g) if g.is_empty() => write!(f, "dir:<root>"),
            Self::Group(g) => write!(f, "dir:{}", g),
        }
    }
}

/// Output of one Pass 2 batch.
///
/// Partial/malformed model output is represented, not discarded: a salvage
/// record has `ok=false`, a `parse_error`, and the raw model text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SemanticRecord {
    pub target: SemanticTarget,
    pub summary: String,
    pub risks: Vec<String>,
    pub raw_model_output: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl SemanticRecord {
    /// Salvage record for a batch whose output could not be used
    pub fn salvage(
        target: SemanticTarget,
        raw_model_output: impl Into<String>,
        parse_error: impl Into<String>,
    ) -> Self {
        Self {
            target,
            summary: String::new(),
            risks: Vec::new(),
            raw_model_output: raw_model_output.into(),
            ok: false,
            parse_error: Some(parse_error.into()),
        }
    }
}

// =============================================================================
// Artifact Manifest
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub artifact_name: String,
    pub relative_path: String,
    pub size_bytes: u64,
    pub content_hash: String,
    /// Stage that produced the artifact
    pub stage: String,
}

/// Ordered manifest of a run's artifacts.
///
/// Invariant: an entry is appended only after its bytes are durably written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactManifest {
    pub entries: Vec<ArtifactEntry>,
    /// SHA-256 over the sorted (name, hash) pairs of all entries
    pub run_fingerprint_sha256: String,
}

impl ArtifactManifest {
    pub fn get(&self, artifact_name: &str) -> Option<&ArtifactEntry> {
        self.entries.iter().find(|e| e.artifact_name == artifact_name)
    }
}

// =============================================================================
// Run Result
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Ok,
    Partial,
    Failed,
    Skipped,
}

/// Status recorded for each stage transition before the next stage runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageStatus {
    pub stage: String,
    pub outcome: StageOutcome,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal summary of one run. Created once at run end, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    pub per_stage_status: Vec<StageStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ArtifactManifest>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Bundle directory (staging dir for dry runs, final dir otherwise)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> FileRecord {
        FileRecord {
            relative_path: path.to_string(),
            size_bytes: 10,
            language_guess: "rust".to_string(),
            content_hash: "abc".to_string(),
            imported_symbols: vec![],
            exported_symbols: vec![],
        }
    }

    #[test]
    fn test_repo_index_sorted_iteration() {
        let mut index = RepoIndex::default();
        index.files.insert("src/b.rs".into(), record("src/b.rs"));
        index.files.insert("src/a.rs".into(), record("src/a.rs"));
        index.files.insert("README.md".into(), record("README.md"));

        let keys: Vec<&String> = index.files.keys().collect();
        assert_eq!(keys, vec!["README.md", "src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn test_top_level_dirs() {
        let mut index = RepoIndex::default();
        index.files.insert("src/a.rs".into(), record("src/a.rs"));
        index
            .files
            .insert("src/sub/b.rs".into(), record("src/sub/b.rs"));
        index.files.insert("docs/x.md".into(), record("docs/x.md"));
        index.files.insert("README.md".into(), record("README.md"));

        assert_eq!(index.top_level_dirs(), vec!["", "docs", "src"]);
    }

    #[test]
    fn test_binary_sentinel() {
        let rec = FileRecord::binary("logo.png", 1234);
        assert_eq!(rec.language_guess, LANGUAGE_BINARY);
        assert!(rec.imported_symbols.is_empty());
        assert!(!rec.is_indexed_text());
    }

    #[test]
    fn test_salvage_record() {
        let rec = SemanticRecord::salvage(
            SemanticTarget::Group("src".into()),
            "not json at all",
            "no JSON object found",
        );
        assert!(!rec.ok);
        assert_eq!(rec.raw_model_output, "not json at all");
        assert!(rec.parse_error.is_some());
        assert!(rec.summary.is_empty());
    }

    #[test]
    fn test_target_display() {
        assert_eq!(SemanticTarget::File("src/a.rs".into()).to_string(), "src/a.rs");
        assert_eq!(SemanticTarget::Group("src".into()).to_string(), "dir:src");
        assert_eq!(SemanticTarget::Group(String::new()).to_string(), "dir:<root>");
    }

    #[test]
    fn test_edge_helpers() {
        let graph = DependencyGraph {
            edges: vec![
                DependencyEdge {
                    from_path: "a.rs".into(),
                    to_path: "b.rs".into(),
                    kind: EdgeKind::Import,
                },
                DependencyEdge {
                    from_path: "a.rs".into(),
                    to_path: "ghost".into(),
                    kind: EdgeKind::Unresolved,
                },
            ],
            cycles: vec![],
        };

        assert_eq!(graph.resolved_edges().count(), 1);
        assert_eq!(graph.unresolved_edges().count(), 1);
        assert_eq!(graph.edges_from("a.rs").count(), 1);
    }
}
