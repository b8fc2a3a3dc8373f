//! Validator
//!
//! Checks structural invariants of all produced records before the artifact
//! writer is allowed to finalize. Errors block finalization; warnings are
//! attached to the run result but do not block it.

use std::fmt;
use std::path::Path;

use tracing::{debug, instrument};

use crate::scanner::sha256_hex;
use crate::types::{
    ArtifactManifest, DependencyGraph, RepoIndex, Result, SemanticRecord, SemanticTarget,
    SnapError,
};

// =============================================================================
// Issues and Report
// =============================================================================

/// Severity levels for validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Critical - blocks artifact finalization
    Error,
    /// Degraded quality - recorded on the run result
    Warning,
    /// Observation that doesn't affect the run
    Info,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueSeverity::Error => write!(f, "ERROR"),
            IssueSeverity::Warning => write!(f, "WARN"),
            IssueSeverity::Info => write!(f, "INFO"),
        }
    }
}

/// A single validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub message: String,
    pub location: Option<String>,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            message: message.into(),
            location: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Info,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    fn describe(&self) -> String {
        match &self.location {
            Some(loc) => format!("{}: {}", loc, self.message),
            None => self.message.clone(),
        }
    }
}

/// Validation result containing all issues found
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error)
    }

    pub fn errors(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .map(|i| i.describe())
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|i| i.severity != IssueSeverity::Error)
            .map(|i| i.describe())
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.errors().len()
    }

    fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }
}

// =============================================================================
// Stage Validation
// =============================================================================

/// Validate the frozen stage outputs before artifact finalization.
#[instrument(skip_all, fields(files = index.len(), edges = graph.edges.len()))]
pub fn validate(
    index: &RepoIndex,
    graph: &DependencyGraph,
    records: &[SemanticRecord],
) -> ValidationReport {
    let mut report = ValidationReport::default();

    validate_edges(index, graph, &mut report);
    validate_records(index, records, &mut report);
    validate_counts(index, &mut report);

    for cycle in &graph.cycles {
        report.add(ValidationIssue::info(format!(
            "dependency cycle: {}",
            cycle.join(" -> ")
        )));
    }

    debug!(
        errors = report.error_count(),
        issues = report.issues.len(),
        "validation complete"
    );
    report
}

/// Every resolved edge endpoint must be an index key; unresolved edges are
/// valid by definition and never flagged.
fn validate_edges(index: &RepoIndex, graph: &DependencyGraph, report: &mut ValidationReport) {
    for edge in &graph.edges {
        if !index.contains(&edge.from_path) {
            report.add(
                ValidationIssue::error("edge source is not an indexed file")
                    .at(edge.from_path.clone()),
            );
        }
        if edge.is_resolved() && !index.contains(&edge.to_path) {
            report.add(
                ValidationIssue::error(format!(
                    "dangling resolved edge to '{}'",
                    edge.to_path
                ))
                .at(edge.from_path.clone()),
            );
        }
    }
}

/// Every semantic record must target a real file or a declared module group.
fn validate_records(index: &RepoIndex, records: &[SemanticRecord], report: &mut ValidationReport) {
    for record in records {
        match &record.target {
            SemanticTarget::File(path) => {
                if !index.contains(path) {
                    report.add(
                        ValidationIssue::error("semantic record targets unknown file")
                            .at(path.clone()),
                    );
                }
            }
            SemanticTarget::Group(group) => {
                let exists = if group.is_empty() {
                    index.files.keys().any(|k| !k.contains('/'))
                } else {
                    let prefix = format!("{}/", group);
                    index.files.keys().any(|k| k.starts_with(&prefix))
                };
                if !exists {
                    report.add(
                        ValidationIssue::error("semantic record targets unknown module group")
                            .at(record.target.to_string()),
                    );
                }
            }
        }

        if record.ok && record.summary.is_empty() {
            report.add(
                ValidationIssue::warning("successful record has empty summary")
                    .at(record.target.to_string()),
            );
        }
        if !record.ok {
            report.add(
                ValidationIssue::warning(format!(
                    "salvage record: {}",
                    record.parse_error.as_deref().unwrap_or("unknown failure")
                ))
                .at(record.target.to_string()),
            );
        }
    }
}

/// Scan counters must agree with the index contents.
fn validate_counts(index: &RepoIndex, report: &mut ValidationReport) {
    let counts = &index.counts;

    if counts.files_included + counts.files_skipped != counts.files_scanned {
        report.add(ValidationIssue::error(format!(
            "scan counts inconsistent: {} included + {} skipped != {} scanned",
            counts.files_included, counts.files_skipped, counts.files_scanned
        )));
    }

    let indexed_text = index.files.values().filter(|r| r.is_indexed_text()).count() as u64;
    if counts.files_included != indexed_text {
        report.add(ValidationIssue::error(format!(
            "files_included={} but index holds {} text records",
            counts.files_included, indexed_text
        )));
    }
}

// =============================================================================
// Manifest Validation
// =============================================================================

/// Internal consistency of a built manifest: no artifact declared twice, no
/// artifact referencing zero bytes, no missing hash.
pub fn validate_manifest(manifest: &ArtifactManifest) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen = std::collections::HashSet::new();

    for entry in &manifest.entries {
        if !seen.insert(entry.artifact_name.clone()) {
            report.add(
                ValidationIssue::error("artifact declared twice").at(entry.artifact_name.clone()),
            );
        }
        if entry.size_bytes == 0 {
            report.add(
                ValidationIssue::error("artifact references zero bytes")
                    .at(entry.artifact_name.clone()),
            );
        }
        if entry.content_hash.is_empty() {
            report.add(
                ValidationIssue::error("artifact missing content hash")
                    .at(entry.artifact_name.clone()),
            );
        }
    }

    if manifest.run_fingerprint_sha256.is_empty() {
        report.add(ValidationIssue::error("manifest missing run fingerprint"));
    }

    report
}

/// Re-check a persisted bundle against its own manifest: every entry must
/// exist on disk with matching size and content hash.
pub fn validate_bundle(bundle_dir: &Path) -> Result<ValidationReport> {
    let manifest_path = bundle_dir.join("manifest.json");
    let manifest_bytes = std::fs::read(&manifest_path).map_err(|e| {
        SnapError::Validation {
            errors: vec![format!("cannot read {}: {}", manifest_path.display(), e)],
        }
    })?;
    let manifest: ArtifactManifest = serde_json::from_slice(&manifest_bytes)?;

    let mut report = validate_manifest(&manifest);

    for entry in &manifest.entries {
        let path = bundle_dir.join(&entry.relative_path);
        match std::fs::read(&path) {
            Ok(bytes) => {
                if bytes.len() as u64 != entry.size_bytes {
                    report.add(
                        ValidationIssue::error(format!(
                            "size mismatch: manifest says {}, file is {}",
                            entry.size_bytes,
                            bytes.len()
                        ))
                        .at(entry.relative_path.clone()),
                    );
                }
                let hash = sha256_hex(&bytes);
                if hash != entry.content_hash {
                    report.add(
                        ValidationIssue::error("content hash mismatch")
                            .at(entry.relative_path.clone()),
                    );
                }
            }
            Err(e) => {
                report.add(
                    ValidationIssue::error(format!("missing artifact file: {}", e))
                        .at(entry.relative_path.clone()),
                );
            }
        }
    }

    Ok(report)
}
