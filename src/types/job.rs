//! Job Specification
//!
//! Immutable description of one pipeline run. Built by the CLI/config layer,
//! validated once, then owned exclusively by the orchestrator for the run's
//! duration. Nothing mutates a JobSpec after the run starts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Result, SnapError};

/// Timestamp format used for run directory names
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Immutable specification of a single pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Path to the checked-out working tree
    pub repo_path: PathBuf,
    /// Identifier used for the bundle directory (derived from the repo
    /// directory name unless overridden)
    pub repo_identifier: String,
    /// Root directory under which run bundles are written
    pub output_root: PathBuf,
    /// Run timestamp, also the name of the final bundle directory
    pub run_timestamp: String,
    /// Write to staging only; skip finalization and upload
    pub dry_run: bool,
    /// Mirror the finished bundle to the remote store
    pub upload_enabled: bool,
    /// Glob patterns of paths to include (empty = everything)
    pub include_filters: Vec<String>,
    /// Glob patterns of paths to exclude
    pub exclude_filters: Vec<String>,
    /// Files larger than this are recorded as binary, not indexed
    pub max_file_bytes: u64,
}

impl JobSpec {
    /// Create a spec for a run starting now
    pub fn new(repo_path: impl AsRef<Path>, output_root: impl AsRef<Path>) -> Self {
        Self::at(repo_path, output_root, Utc::now())
    }

    /// Create a spec with an explicit run time (tests, replays)
    pub fn at(
        repo_path: impl AsRef<Path>,
        output_root: impl AsRef<Path>,
        run_time: DateTime<Utc>,
    ) -> Self {
        let repo_path = repo_path.as_ref().to_path_buf();
        let repo_identifier = repo_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repo".to_string());

        Self {
            repo_path,
            repo_identifier,
            output_root: output_root.as_ref().to_path_buf(),
            run_timestamp: run_time.format(RUN_TIMESTAMP_FORMAT).to_string(),
            dry_run: false,
            upload_enabled: false,
            include_filters: Vec::new(),
            exclude_filters: Vec::new(),
            max_file_bytes: crate::constants::scan::MAX_FILE_BYTES,
        }
    }

    pub fn with_identifier(mut self, id: impl Into<String>) -> Self {
        self.repo_identifier = id.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_upload(mut self, enabled: bool) -> Self {
        self.upload_enabled = enabled;
        self
    }

    pub fn with_filters(mut self, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.include_filters = include;
        self.exclude_filters = exclude;
        self
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    /// Final bundle directory: `<output_root>/<repo_identifier>/<run_timestamp>/`
    pub fn run_dir(&self) -> PathBuf {
        self.output_root
            .join(&self.repo_identifier)
            .join(&self.run_timestamp)
    }

    /// Staging directory the writer populates before the atomic rename
    pub fn staging_dir(&self) -> PathBuf {
        self.output_root
            .join(&self.repo_identifier)
            .join(format!(".staging-{}", self.run_timestamp))
    }

    /// Check the spec describes an obtainable working tree.
    ///
    /// A missing or non-directory repo path is an acquisition failure: the
    /// run never starts.
    pub fn validate(&self) -> Result<()> {
        if !self.repo_path.exists() {
            return Err(SnapError::Acquisition(format!(
                "repository path does not exist: {}",
                self.repo_path.display()
            )));
        }
        if !self.repo_path.is_dir() {
            return Err(SnapError::Acquisition(format!(
                "repository path is not a directory: {}",
                self.repo_path.display()
            )));
        }
        if self.repo_identifier.is_empty() {
            return Err(SnapError::Config("repo_identifier is empty".to_string()));
        }
        if self.run_timestamp.is_empty() {
            return Err(SnapError::Config("run_timestamp is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_dir_layout() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let spec = JobSpec::at("/tmp/myrepo", "/tmp/out", ts);

        assert_eq!(spec.repo_identifier, "myrepo");
        assert_eq!(spec.run_timestamp, "20240501T123000Z");
        assert_eq!(
            spec.run_dir(),
            PathBuf::from("/tmp/out/myrepo/20240501T123000Z")
        );
        assert_eq!(
            spec.staging_dir(),
            PathBuf::from("/tmp/out/myrepo/.staging-20240501T123000Z")
        );
    }

    #[test]
    fn test_validate_missing_repo() {
        let spec = JobSpec::new("/nonexistent/path/xyz", "/tmp/out");
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, SnapError::Acquisition(_)));
    }

    #[test]
    fn test_validate_existing_repo() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = JobSpec::new(dir.path(), "/tmp/out");
        assert!(spec.validate().is_ok());
    }
}
