//! Artifact Writer
//!
//! Persists a run's documents with all-or-nothing visibility: everything is
//! written into a staging directory, hashed into the manifest, and the
//! staging directory is atomically renamed into its final timestamped
//! location. A crash mid-write leaves only the staging directory, never a
//! half-populated final directory. The rename is also the single-run
//! enforcement point: a second run targeting the same timestamped path
//! fails fast instead of interleaving writes.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::documents::Document;
use crate::scanner::sha256_hex;
use crate::types::{ArtifactEntry, ArtifactManifest, JobSpec, Result, SnapError};

pub struct ArtifactWriter {
    staging_dir: PathBuf,
    final_dir: PathBuf,
    dry_run: bool,
}

impl ArtifactWriter {
    pub fn for_job(spec: &JobSpec) -> Self {
        Self {
            staging_dir: spec.staging_dir(),
            final_dir: spec.run_dir(),
            dry_run: spec.dry_run,
        }
    }

    /// Where the bundle ends up: staging for dry runs, final otherwise
    pub fn output_dir(&self) -> &Path {
        if self.dry_run {
            &self.staging_dir
        } else {
            &self.final_dir
        }
    }

    /// Stage all documents, build the manifest, finalize atomically.
    ///
    /// Dry runs stop after staging: the staging directory is the terminal
    /// output and no rename happens.
    #[instrument(skip(self, documents), fields(count = documents.len(), dry_run = self.dry_run))]
    pub fn persist(&self, documents: &[Document]) -> Result<ArtifactManifest> {
        if !self.dry_run && self.final_dir.exists() {
            return Err(SnapError::Write(format!(
                "bundle directory already exists: {}",
                self.final_dir.display()
            )));
        }

        // A stale staging directory is leftover from a crashed run with the
        // same timestamp; replace it wholesale
        if self.staging_dir.exists() {
            fs::remove_dir_all(&self.staging_dir)?;
        }
        fs::create_dir_all(&self.staging_dir)?;

        let mut entries = Vec::with_capacity(documents.len());
        for doc in documents {
            let path = self.staging_dir.join(&doc.relative_path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &doc.bytes)?;
            debug!(artifact = %doc.name, bytes = doc.bytes.len(), "staged");

            // The entry is appended only after the bytes are durably written
            entries.push(ArtifactEntry {
                artifact_name: doc.name.clone(),
                relative_path: doc.relative_path.clone(),
                size_bytes: doc.bytes.len() as u64,
                content_hash: sha256_hex(&doc.bytes),
                stage: "writing".to_string(),
            });
        }

        let manifest = ArtifactManifest {
            run_fingerprint_sha256: run_fingerprint(&entries),
            entries,
        };

        let mut manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
        manifest_bytes.push(b'\n');
        fs::write(self.staging_dir.join("manifest.json"), &manifest_bytes)?;

        if self.dry_run {
            info!(dir = %self.staging_dir.display(), "dry run: bundle left in staging");
            return Ok(manifest);
        }

        fs::rename(&self.staging_dir, &self.final_dir).map_err(|e| {
            SnapError::Write(format!(
                "failed to finalize bundle at {}: {}",
                self.final_dir.display(),
                e
            ))
        })?;

        info!(dir = %self.final_dir.display(), "bundle finalized");
        Ok(manifest)
    }

    /// Remove the staging directory after a failed run so nothing
    /// half-written stays visible.
    pub fn discard_staging(&self) -> Result<()> {
        if self.staging_dir.exists() {
            fs::remove_dir_all(&self.staging_dir)?;
        }
        Ok(())
    }
}

/// Fingerprint over the sorted (name, hash) pairs of all entries
fn run_fingerprint(entries: &[ArtifactEntry]) -> String {
    let mut pairs: Vec<String> = entries
        .iter()
        .map(|e| format!("{}:{}", e.artifact_name, e.content_hash))
        .collect();
    pairs.sort();
    sha256_hex(pairs.join("\n").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::validate_bundle;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn docs() -> Vec<Document> {
        vec![
            Document {
                name: "repo_index".to_string(),
                relative_path: "repo_index.json".to_string(),
                bytes: b"{\"files\": {}}\n".to_vec(),
            },
            Document {
                name: "onboarding".to_string(),
                relative_path: "onboarding.md".to_string(),
                bytes: b"# Onboarding\n".to_vec(),
            },
        ]
    }

    fn spec_in(out: &TempDir) -> JobSpec {
        let ts = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        JobSpec::at("/tmp/repo", out.path(), ts)
    }

    #[test]
    fn test_persist_finalizes_atomically() {
        let out = TempDir::new().unwrap();
        let spec = spec_in(&out);
        let writer = ArtifactWriter::for_job(&spec);

        let manifest = writer.persist(&docs()).unwrap();

        assert_eq!(manifest.entries.len(), 2);
        assert!(spec.run_dir().join("repo_index.json").exists());
        assert!(spec.run_dir().join("manifest.json").exists());
        // No staging directory survives a successful run
        assert!(!spec.staging_dir().exists());
    }

    #[test]
    fn test_second_run_same_timestamp_fails_fast() {
        let out = TempDir::new().unwrap();
        let spec = spec_in(&out);

        ArtifactWriter::for_job(&spec).persist(&docs()).unwrap();
        let err = ArtifactWriter::for_job(&spec).persist(&docs()).unwrap_err();

        assert!(matches!(err, SnapError::Write(_)));
    }

    #[test]
    fn test_dry_run_leaves_only_staging() {
        let out = TempDir::new().unwrap();
        let spec = spec_in(&out).with_dry_run(true);
        let writer = ArtifactWriter::for_job(&spec);

        writer.persist(&docs()).unwrap();

        assert!(spec.staging_dir().join("manifest.json").exists());
        assert!(!spec.run_dir().exists());
    }

    #[test]
    fn test_persisted_bundle_revalidates() {
        let out = TempDir::new().unwrap();
        let spec = spec_in(&out);
        ArtifactWriter::for_job(&spec).persist(&docs()).unwrap();

        let report = validate_bundle(&spec.run_dir()).unwrap();
        assert!(report.is_valid(), "errors: {:?}", report.errors());
    }

    #[test]
    fn test_manifest_hashes_match_bytes() {
        let out = TempDir::new().unwrap();
        let spec = spec_in(&out);
        let manifest = ArtifactWriter::for_job(&spec).persist(&docs()).unwrap();

        for entry in &manifest.entries {
            let bytes = std::fs::read(spec.run_dir().join(&entry.relative_path)).unwrap();
            assert_eq!(entry.content_hash, sha256_hex(&bytes));
            assert_eq!(entry.size_bytes, bytes.len() as u64);
        }
    }

    #[test]
    fn test_dry_run_hashes_match_real_run() {
        // Same documents through a dry run and a real run produce the same
        // manifest fingerprint
        let out_real = TempDir::new().unwrap();
        let out_dry = TempDir::new().unwrap();

        let real = ArtifactWriter::for_job(&spec_in(&out_real))
            .persist(&docs())
            .unwrap();
        let dry = ArtifactWriter::for_job(&spec_in(&out_dry).with_dry_run(true))
            .persist(&docs())
            .unwrap();

        assert_eq!(real.run_fingerprint_sha256, dry.run_fingerprint_sha256);
    }

    #[test]
    fn test_stale_staging_replaced() {
        let out = TempDir::new().unwrap();
        let spec = spec_in(&out);

        // Simulate a crashed earlier run
        std::fs::create_dir_all(spec.staging_dir()).unwrap();
        std::fs::write(spec.staging_dir().join("leftover.json"), b"junk").unwrap();

        ArtifactWriter::for_job(&spec).persist(&docs()).unwrap();

        assert!(!spec.run_dir().join("leftover.json").exists());
    }

    #[test]
    fn test_discard_staging() {
        let out = TempDir::new().unwrap();
        let spec = spec_in(&out).with_dry_run(true);
        let writer = ArtifactWriter::for_job(&spec);
        writer.persist(&docs()).unwrap();

        writer.discard_staging().unwrap();
        assert!(!spec.staging_dir().exists());
    }
}
