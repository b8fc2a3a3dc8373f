pub mod error;
pub mod job;
pub mod records;

pub use error::{
    CompletionError, CompletionErrorKind, ErrorClassifier, Result, SnapError,
};
pub use job::JobSpec;
pub use records::{
    ArtifactEntry, ArtifactManifest, DependencyEdge, DependencyGraph, EdgeKind, FileRecord,
    LANGUAGE_BINARY, LANGUAGE_UNREADABLE, RepoIndex, RunResult, RunStatus, ScanCounts,
    SemanticRecord, SemanticTarget, StageOutcome, StageStatus,
};
