//! Pipeline Orchestrator
//!
//! Explicit finite-state machine sequencing the snapshot stages:
//!
//! ```text
//! Init -> Scanning -> GraphBuilding -> Analyzing -> Validating -> Writing
//!      -> Uploading (optional) -> Done
//! ```
//!
//! plus a terminal `Failed` state reachable from any stage on a
//! non-recoverable error. The orchestrator is the sole owner of cross-stage
//! sequencing; no stage invokes another directly. Each transition records
//! stage status and duration before the next stage runs, and every run -
//! including a failed one - terminates with a RunResult describing exactly
//! what succeeded, what was salvaged, and what is missing.

use std::time::Instant;

use tracing::{error, info, instrument};

use crate::ai::{CompletionOptions, SharedCompletion};
use crate::artifact::{ArtifactWriter, build_documents};
use crate::graph::build_graph;
use crate::scanner::Scanner;
use crate::semantic::{BatchConfig, SemanticAnalyzer};
use crate::types::{
    ArtifactManifest, DependencyGraph, JobSpec, RepoIndex, RunResult, RunStatus, SemanticRecord,
    SnapError, StageOutcome, StageStatus,
};
use crate::upload::{SharedUploader, mirror_bundle};
use crate::validator::validate;

// =============================================================================
// Stage State Machine
// =============================================================================

/// Closed set of pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Scanning,
    GraphBuilding,
    Analyzing,
    Validating,
    Writing,
    Uploading,
    Done,
    Failed,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Scanning => "scanning",
            Self::GraphBuilding => "graph_building",
            Self::Analyzing => "analyzing",
            Self::Validating => "validating",
            Self::Writing => "writing",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// The single transition table. Dry runs short-circuit after Writing;
    /// Uploading only exists when the job asks for it.
    pub fn next(&self, dry_run: bool, upload_enabled: bool) -> Option<Stage> {
        match self {
            Self::Init => Some(Self::Scanning),
            Self::Scanning => Some(Self::GraphBuilding),
            Self::GraphBuilding => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Validating),
            Self::Validating => Some(Self::Writing),
            Self::Writing => {
                if upload_enabled && !dry_run {
                    Some(Self::Uploading)
                } else {
                    Some(Self::Done)
                }
            }
            Self::Uploading => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Everything a stage may hand to its successor
#[derive(Default)]
struct StageOutputs {
    index: Option<RepoIndex>,
    graph: Option<DependencyGraph>,
    records: Vec<SemanticRecord>,
    analysis_partial: bool,
    manifest: Option<ArtifactManifest>,
}

pub struct Pipeline {
    spec: JobSpec,
    provider: SharedCompletion,
    options: CompletionOptions,
    batch_config: BatchConfig,
    uploader: Option<SharedUploader>,
}

impl Pipeline {
    pub fn new(spec: JobSpec, provider: SharedCompletion) -> Self {
        Self {
            spec,
            provider,
            options: CompletionOptions::default(),
            batch_config: BatchConfig::default(),
            uploader: None,
        }
    }

    pub fn with_completion_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_batch_config(mut self, config: BatchConfig) -> Self {
        self.batch_config = config;
        self
    }

    pub fn with_uploader(mut self, uploader: SharedUploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Drive the state machine to a terminal state.
    ///
    /// Never panics and never returns early: the output is always a
    /// RunResult, even when the run fails before producing artifacts.
    #[instrument(skip(self), fields(repo = %self.spec.repo_identifier, run = %self.spec.run_timestamp))]
    pub async fn run(&self) -> RunResult {
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut statuses: Vec<StageStatus> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut outputs = StageOutputs::default();
        let mut output_dir: Option<String> = None;

        // Working-tree acquisition gate: the run never starts without one
        if let Err(e) = self.spec.validate() {
            error!(error = %e, "job specification rejected");
            errors.push(e.to_string());
            return RunResult {
                run_id,
                status: RunStatus::Failed,
                per_stage_status: vec![StageStatus {
                    stage: Stage::Init.name().to_string(),
                    outcome: StageOutcome::Failed,
                    duration_ms: 0,
                    error: Some(e.to_string()),
                }],
                manifest: None,
                errors,
                warnings,
                output_dir: None,
            };
        }

        let mut stage = Stage::Init;
        let mut failed = false;

        while let Some(next) = stage.next(self.spec.dry_run, self.spec.upload_enabled) {
            stage = next;
            if stage.is_terminal() {
                break;
            }

            info!(stage = stage.name(), "stage starting");
            let started = Instant::now();
            let result = self
                .execute_stage(stage, &mut outputs, &mut warnings, &mut output_dir)
                .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(outcome) => {
                    statuses.push(StageStatus {
                        stage: stage.name().to_string(),
                        outcome,
                        duration_ms,
                        error: None,
                    });
                    if outcome == StageOutcome::Failed {
                        // Analyzer-style soft failure: recorded, run fails,
                        // but it is not an abort mid-stage
                        errors.push(format!("stage {} failed", stage.name()));
                        failed = true;
                        break;
                    }
                }
                Err(e) => {
                    error!(stage = stage.name(), error = %e, "stage failed");
                    statuses.push(StageStatus {
                        stage: stage.name().to_string(),
                        outcome: StageOutcome::Failed,
                        duration_ms,
                        error: Some(e.to_string()),
                    });
                    // Validation failures carry their full report
                    if let SnapError::Validation { errors: details } = &e {
                        errors.extend(details.iter().cloned());
                    }
                    errors.push(e.to_string());
                    failed = true;
                    break;
                }
            }
        }

        let status = if failed {
            RunStatus::Failed
        } else if outputs.analysis_partial {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };

        info!(status = %status, stages = statuses.len(), "run finished");

        RunResult {
            run_id,
            status,
            per_stage_status: statuses,
            manifest: outputs.manifest,
            errors,
            warnings,
            output_dir,
        }
    }

    /// Execute one stage body. `Err` means a fatal abort; `Ok(Failed)` is a
    /// recorded stage failure that still ends the run cleanly.
    async fn execute_stage(
        &self,
        stage: Stage,
        outputs: &mut StageOutputs,
        warnings: &mut Vec<String>,
        output_dir: &mut Option<String>,
    ) -> Result<StageOutcome, SnapError> {
        match stage {
            Stage::Scanning => {
                let spec = self.spec.clone();
                let index = tokio::task::spawn_blocking(move || Scanner::for_job(&spec).scan())
                    .await
                    .map_err(|e| SnapError::Scan(format!("scan task panicked: {}", e)))??;
                info!(files = index.len(), "scan complete");
                outputs.index = Some(index);
                Ok(StageOutcome::Ok)
            }

            Stage::GraphBuilding => {
                let index = outputs.index.as_ref().ok_or_else(|| {
                    SnapError::pipeline(stage.name(), "no repo index from scanning stage")
                })?;
                let graph = build_graph(index);
                info!(
                    edges = graph.edges.len(),
                    unresolved = graph.unresolved_edges().count(),
                    cycles = graph.cycles.len(),
                    "graph built"
                );
                outputs.graph = Some(graph);
                Ok(StageOutcome::Ok)
            }

            Stage::Analyzing => {
                let index = outputs.index.as_ref().ok_or_else(|| {
                    SnapError::pipeline(stage.name(), "no repo index from scanning stage")
                })?;
                let graph = outputs.graph.as_ref().ok_or_else(|| {
                    SnapError::pipeline(stage.name(), "no graph from graph-building stage")
                })?;

                let analyzer = SemanticAnalyzer::new(
                    self.provider.clone(),
                    self.options.clone(),
                    self.batch_config.clone(),
                );
                let outcome = analyzer.analyze(index, graph).await;

                let stage_outcome = outcome.stage_outcome();
                outputs.analysis_partial = stage_outcome == StageOutcome::Partial;
                outputs.records = outcome.records;
                Ok(stage_outcome)
            }

            Stage::Validating => {
                let index = outputs.index.as_ref().ok_or_else(|| {
                    SnapError::pipeline(stage.name(), "no repo index from scanning stage")
                })?;
                let graph = outputs.graph.as_ref().ok_or_else(|| {
                    SnapError::pipeline(stage.name(), "no graph from graph-building stage")
                })?;

                let report = validate(index, graph, &outputs.records);
                warnings.extend(report.warnings());

                if !report.is_valid() {
                    // Errors block artifact finalization
                    return Err(SnapError::Validation {
                        errors: report.errors(),
                    });
                }
                Ok(StageOutcome::Ok)
            }

            Stage::Writing => {
                let index = outputs.index.as_ref().ok_or_else(|| {
                    SnapError::pipeline(stage.name(), "no repo index from scanning stage")
                })?;
                let graph = outputs.graph.as_ref().ok_or_else(|| {
                    SnapError::pipeline(stage.name(), "no graph from graph-building stage")
                })?;

                let documents = build_documents(&self.spec, index, graph, &outputs.records)?;

                let spec = self.spec.clone();
                let manifest = tokio::task::spawn_blocking(move || {
                    ArtifactWriter::for_job(&spec).persist(&documents)
                })
                .await
                .map_err(|e| SnapError::Write(format!("write task panicked: {}", e)))??;

                let writer = ArtifactWriter::for_job(&self.spec);
                *output_dir = Some(writer.output_dir().display().to_string());
                outputs.manifest = Some(manifest);
                Ok(StageOutcome::Ok)
            }

            Stage::Uploading => {
                let manifest = outputs.manifest.as_ref().ok_or_else(|| {
                    SnapError::pipeline(stage.name(), "no manifest from writing stage")
                })?;

                let Some(uploader) = &self.uploader else {
                    warnings.push("upload enabled but no uploader configured".to_string());
                    return Ok(StageOutcome::Skipped);
                };

                let prefix = format!("{}/{}", self.spec.repo_identifier, self.spec.run_timestamp);
                let upload_warnings =
                    mirror_bundle(uploader.as_ref(), &self.spec.run_dir(), &prefix, manifest).await;

                let outcome = if upload_warnings.is_empty() {
                    StageOutcome::Ok
                } else {
                    StageOutcome::Partial
                };
                warnings.extend(upload_warnings);
                Ok(outcome)
            }

            Stage::Init | Stage::Done | Stage::Failed => Ok(StageOutcome::Ok),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::CompletionProvider;
    use crate::types::{CompletionError, CompletionErrorKind};
    use crate::upload::Uploader;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    const GOOD_RESPONSE: &str =
        r#"{"summary": "Small module with clear boundaries.", "risks": ["sparse docs"]}"#;

    struct MockProvider {
        response: Option<String>,
        fail_kind: Option<CompletionErrorKind>,
        fail_on: Option<String>,
    }

    impl MockProvider {
        fn ok() -> Self {
            Self {
                response: Some(GOOD_RESPONSE.to_string()),
                fail_kind: None,
                fail_on: None,
            }
        }

        fn always_failing(kind: CompletionErrorKind) -> Self {
            Self {
                response: None,
                fail_kind: Some(kind),
                fail_on: None,
            }
        }

        fn failing_on(kind: CompletionErrorKind, marker: &str) -> Self {
            Self {
                response: Some(GOOD_RESPONSE.to_string()),
                fail_kind: Some(kind),
                fail_on: Some(marker.to_string()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for MockProvider {
        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> std::result::Result<String, CompletionError> {
            if let Some(kind) = self.fail_kind {
                let applies = self
                    .fail_on
                    .as_ref()
                    .map(|m| prompt.contains(m.as_str()))
                    .unwrap_or(true);
                if applies {
                    return Err(CompletionError::new(kind, "mock failure"));
                }
            }
            Ok(self.response.clone().unwrap_or_default())
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-model"
        }
    }

    struct RecordingUploader {
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Uploader for RecordingUploader {
        async fn put_object(&self, key: &str, _bytes: &[u8]) -> crate::types::Result<()> {
            self.keys.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn sample_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let write = |rel: &str, content: &str| {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        };
        write("src/main.py", "from lib.helper import run\n\ndef main():\n    pass\n");
        write("lib/helper.py", "def run():\n    pass\n");
        write("lib/orphan.py", "import ghost.module\n");
        write("README.md", "# Sample\n");
        dir
    }

    fn spec_for(repo: &Path, out: &Path) -> JobSpec {
        let ts = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        JobSpec::at(repo, out, ts)
    }

    fn fast_batch_config() -> BatchConfig {
        BatchConfig {
            per_call_timeout: Duration::from_secs(5),
            run_deadline: Duration::from_secs(30),
            max_retries: 0,
            ..Default::default()
        }
    }

    fn bundle_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_full_run_succeeds() {
        let repo = sample_repo();
        let out = TempDir::new().unwrap();
        let spec = spec_for(repo.path(), out.path());

        let pipeline = Pipeline::new(spec.clone(), Arc::new(MockProvider::ok()))
            .with_batch_config(fast_batch_config());
        let result = pipeline.run().await;

        assert_eq!(result.status, RunStatus::Success, "errors: {:?}", result.errors);
        assert!(result.errors.is_empty());

        let stage_names: Vec<&str> = result
            .per_stage_status
            .iter()
            .map(|s| s.stage.as_str())
            .collect();
        assert_eq!(
            stage_names,
            vec!["scanning", "graph_building", "analyzing", "validating", "writing"]
        );

        assert_eq!(
            bundle_files(&spec.run_dir()),
            vec![
                "architecture.json",
                "dependency_graph.json",
                "gaps.json",
                "manifest.json",
                "onboarding.md",
                "repo_index.json",
                "semantic_analysis.json",
            ]
        );
        assert!(result.manifest.is_some());
        assert!(!spec.staging_dir().exists());
    }

    #[tokio::test]
    async fn test_unresolvable_import_is_not_an_error() {
        let repo = sample_repo();
        let out = TempDir::new().unwrap();
        let spec = spec_for(repo.path(), out.path());

        let result = Pipeline::new(spec, Arc::new(MockProvider::ok()))
            .with_batch_config(fast_batch_config())
            .run()
            .await;

        // `lib/orphan.py` imports a phantom module; the run still succeeds
        assert_eq!(result.status, RunStatus::Success);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_partial_analysis_yields_partial_run() {
        let repo = sample_repo();
        let out = TempDir::new().unwrap();
        let spec = spec_for(repo.path(), out.path());

        // The `lib` group fails with auth; `src` and root groups succeed
        let provider = Arc::new(MockProvider::failing_on(CompletionErrorKind::Auth, "dir:lib"));
        let result = Pipeline::new(spec.clone(), provider)
            .with_batch_config(fast_batch_config())
            .run()
            .await;

        assert_eq!(result.status, RunStatus::Partial);
        // The bundle is still written with the salvage record inside
        assert!(spec.run_dir().join("semantic_analysis.json").exists());

        let semantic: serde_json::Value = serde_json::from_slice(
            &std::fs::read(spec.run_dir().join("semantic_analysis.json")).unwrap(),
        )
        .unwrap();
        let records = semantic["records"].as_array().unwrap();
        assert!(records.iter().any(|r| r["ok"] == false));
        assert!(records.iter().any(|r| r["ok"] == true));
    }

    #[tokio::test]
    async fn test_all_batches_failing_fails_run_without_bundle() {
        let repo = sample_repo();
        let out = TempDir::new().unwrap();
        let spec = spec_for(repo.path(), out.path());

        let provider = Arc::new(MockProvider::always_failing(CompletionErrorKind::Timeout));
        let result = Pipeline::new(spec.clone(), provider)
            .with_batch_config(fast_batch_config())
            .run()
            .await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(!spec.run_dir().exists());
        assert!(!spec.staging_dir().exists());

        let analyzing = result
            .per_stage_status
            .iter()
            .find(|s| s.stage == "analyzing")
            .unwrap();
        assert_eq!(analyzing.outcome, StageOutcome::Failed);
    }

    #[tokio::test]
    async fn test_missing_repo_never_starts() {
        let out = TempDir::new().unwrap();
        let spec = spec_for(Path::new("/nonexistent/repo/xyz"), out.path());

        let result = Pipeline::new(spec, Arc::new(MockProvider::ok())).run().await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.per_stage_status.len(), 1);
        assert_eq!(result.per_stage_status[0].stage, "init");
    }

    #[tokio::test]
    async fn test_dry_run_stops_at_staging() {
        let repo = sample_repo();
        let out = TempDir::new().unwrap();
        let spec = spec_for(repo.path(), out.path()).with_dry_run(true);

        let result = Pipeline::new(spec.clone(), Arc::new(MockProvider::ok()))
            .with_batch_config(fast_batch_config())
            .run()
            .await;

        assert_eq!(result.status, RunStatus::Success);
        assert!(spec.staging_dir().join("manifest.json").exists());
        assert!(!spec.run_dir().exists());
        // Dry runs never reach Uploading
        assert!(!result.per_stage_status.iter().any(|s| s.stage == "uploading"));
    }

    #[tokio::test]
    async fn test_second_run_same_timestamp_fails() {
        let repo = sample_repo();
        let out = TempDir::new().unwrap();
        let spec = spec_for(repo.path(), out.path());

        let first = Pipeline::new(spec.clone(), Arc::new(MockProvider::ok()))
            .with_batch_config(fast_batch_config())
            .run()
            .await;
        assert_eq!(first.status, RunStatus::Success);

        let second = Pipeline::new(spec, Arc::new(MockProvider::ok()))
            .with_batch_config(fast_batch_config())
            .run()
            .await;
        assert_eq!(second.status, RunStatus::Failed);
        assert!(second.errors[0].contains("already exists"));
    }

    #[tokio::test]
    async fn test_upload_mirrors_bundle() {
        let repo = sample_repo();
        let out = TempDir::new().unwrap();
        let spec = spec_for(repo.path(), out.path()).with_upload(true);

        let uploader = Arc::new(RecordingUploader {
            keys: Mutex::new(Vec::new()),
        });
        let result = Pipeline::new(spec, Arc::new(MockProvider::ok()))
            .with_batch_config(fast_batch_config())
            .with_uploader(uploader.clone())
            .run()
            .await;

        assert_eq!(result.status, RunStatus::Success);
        let keys = uploader.keys.lock().unwrap();
        // 6 documents + manifest
        assert_eq!(keys.len(), 7);
        assert!(keys.iter().all(|k| k.contains("/20240501T120000Z/")));
        assert!(keys.iter().any(|k| k.ends_with("manifest.json")));
    }

    #[tokio::test]
    async fn test_repeat_runs_are_byte_identical() {
        let repo = sample_repo();
        let out_a = TempDir::new().unwrap();
        let out_b = TempDir::new().unwrap();

        let spec_a = spec_for(repo.path(), out_a.path());
        let spec_b = spec_for(repo.path(), out_b.path());

        Pipeline::new(spec_a.clone(), Arc::new(MockProvider::ok()))
            .with_batch_config(fast_batch_config())
            .run()
            .await;
        Pipeline::new(spec_b.clone(), Arc::new(MockProvider::ok()))
            .with_batch_config(fast_batch_config())
            .run()
            .await;

        for name in bundle_files(&spec_a.run_dir()) {
            let a = std::fs::read(spec_a.run_dir().join(&name)).unwrap();
            let b = std::fs::read(spec_b.run_dir().join(&name)).unwrap();
            assert_eq!(a, b, "{} differs between identical runs", name);
        }
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(Stage::Init.next(false, false), Some(Stage::Scanning));
        assert_eq!(Stage::Writing.next(false, false), Some(Stage::Done));
        assert_eq!(Stage::Writing.next(false, true), Some(Stage::Uploading));
        // Dry runs skip uploading even when enabled
        assert_eq!(Stage::Writing.next(true, true), Some(Stage::Done));
        assert_eq!(Stage::Done.next(false, false), None);
        assert_eq!(Stage::Failed.next(false, false), None);
    }
}
