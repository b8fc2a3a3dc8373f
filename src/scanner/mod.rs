//! Static Scanner (Pass 1)
//!
//! Deterministic, non-LLM structural scan of a repository working tree.
//! Produces the authoritative RepoIndex for the run: one FileRecord per
//! scanned file with a content hash and heuristic symbol lists.
//!
//! Per-file problems never abort the scan - binary, oversized, and
//! unreadable files are recorded with sentinel language guesses and empty
//! symbol lists. The scan fails only when the root path itself is unusable.

pub mod lexical;

pub use lexical::{LexicalScan, detect_language, scan_symbols};

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::constants::scan::BINARY_SNIFF_BYTES;
use crate::types::{FileRecord, JobSpec, RepoIndex, Result, ScanCounts, SnapError};

pub struct Scanner {
    root: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    max_file_bytes: u64,
}

impl Scanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            include: Vec::new(),
            exclude: Vec::new(),
            max_file_bytes: crate::constants::scan::MAX_FILE_BYTES,
        }
    }

    /// Create a scanner configured from a job specification
    pub fn for_job(spec: &JobSpec) -> Self {
        Self {
            root: spec.repo_path.clone(),
            include: spec.include_filters.clone(),
            exclude: spec.exclude_filters.clone(),
            max_file_bytes: spec.max_file_bytes,
        }
    }

    pub fn with_include(mut self, patterns: Vec<String>) -> Self {
        self.include = patterns;
        self
    }

    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    pub fn with_max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    /// Walk the tree and build the repo index.
    ///
    /// Fails only on an unreadable root path; per-file errors become
    /// `unreadable` records.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn scan(&self) -> Result<RepoIndex> {
        let root_meta = std::fs::metadata(&self.root)
            .map_err(|e| SnapError::Scan(format!("{}: {}", self.root.display(), e)))?;
        if !root_meta.is_dir() {
            return Err(SnapError::Scan(format!(
                "not a directory: {}",
                self.root.display()
            )));
        }

        let mut index = RepoIndex::default();
        let mut counts = ScanCounts::default();

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false) // Security: prevent symlink traversal attacks
            .build();

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let Some(relative) = self.relative_path(path) else {
                continue;
            };

            counts.files_scanned += 1;

            if !self.is_selected(&relative) {
                counts.files_skipped += 1;
                continue;
            }

            let record = self.scan_file(path, &relative);
            if record.is_indexed_text() {
                counts.files_included += 1;
                counts.total_bytes_included += record.size_bytes;
            } else {
                counts.files_skipped += 1;
            }
            index.files.insert(relative, record);
        }

        index.counts = counts;
        debug!(
            files = index.files.len(),
            included = index.counts.files_included,
            "scan complete"
        );
        Ok(index)
    }

    /// Scan one file into a record. Never fails: problems become sentinel
    /// records.
    fn scan_file(&self, path: &Path, relative: &str) -> FileRecord {
        let metadata = match path.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("cannot stat {}: {}", relative, e);
                return FileRecord::unreadable(relative);
            }
        };

        let size = metadata.len();
        if size > self.max_file_bytes {
            return FileRecord::binary(relative, size);
        }

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!("cannot read {}: {}", relative, e);
                return FileRecord::unreadable(relative);
            }
        };

        let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
        if sniff.contains(&0) {
            return FileRecord::binary(relative, size);
        }

        let content = String::from_utf8_lossy(&bytes);
        let language = detect_language(relative);
        let symbols = scan_symbols(language, &content);

        FileRecord {
            relative_path: relative.to_string(),
            size_bytes: size,
            language_guess: language.to_string(),
            content_hash: sha256_hex(&bytes),
            imported_symbols: symbols.imported_symbols,
            exported_symbols: symbols.exported_symbols,
        }
    }

    /// Relative path with forward slashes, for stable cross-platform keys
    fn relative_path(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .filter(|p| !p.is_empty())
    }

    fn is_selected(&self, relative: &str) -> bool {
        if !self.include.is_empty()
            && !self
                .include
                .iter()
                .any(|pattern| glob_matches(pattern, relative))
        {
            return false;
        }

        !self
            .exclude
            .iter()
            .any(|pattern| glob_matches(pattern, relative))
    }
}

fn glob_matches(pattern: &str, path: &str) -> bool {
    glob::Pattern::new(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}

/// SHA-256 digest as a lowercase hex string
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
