//! Artifact Documents
//!
//! Builds the structured JSON documents of a run bundle. Every document
//! carries a schema version, the repo/run identity, a `generated_at` stamp,
//! and a fingerprint over its timestamp-free content - so two runs against
//! identical inputs produce identical fingerprints even when their stamps
//! differ.
//!
//! serde_json's default map is sorted, which makes every serialization here
//! deterministic without extra bookkeeping.

use serde_json::{Map, Value, json};

use crate::scanner::sha256_hex;
use crate::types::{DependencyGraph, JobSpec, RepoIndex, Result, SemanticRecord};

pub const SCHEMA_REPO_INDEX: &str = "repo_index.v1";
pub const SCHEMA_DEPENDENCY_GRAPH: &str = "dependency_graph.v1";
pub const SCHEMA_SEMANTIC_ANALYSIS: &str = "semantic_analysis.v1";
pub const SCHEMA_GAPS: &str = "gaps.v1";
pub const SCHEMA_ARCHITECTURE: &str = "architecture_snapshot.v1";

/// One bundle document, ready to stage
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub relative_path: String,
    pub bytes: Vec<u8>,
}

/// Build the full ordered document set for a run (everything except the
/// manifest, which the writer appends after staging).
pub fn build_documents(
    spec: &JobSpec,
    index: &RepoIndex,
    graph: &DependencyGraph,
    records: &[SemanticRecord],
) -> Result<Vec<Document>> {
    // The run timestamp appears only in `generated_at`; keeping it out of
    // the repo block keeps fingerprints comparable across runs
    let repo = json!({
        "repo_identifier": spec.repo_identifier,
    });

    let mut documents = Vec::new();

    documents.push(json_document(
        "repo_index",
        "repo_index.json",
        SCHEMA_REPO_INDEX,
        &repo,
        &spec.run_timestamp,
        [
            ("counts".to_string(), serde_json::to_value(&index.counts)?),
            ("files".to_string(), serde_json::to_value(&index.files)?),
        ],
    )?);

    documents.push(json_document(
        "dependency_graph",
        "dependency_graph.json",
        SCHEMA_DEPENDENCY_GRAPH,
        &repo,
        &spec.run_timestamp,
        [
            ("edges".to_string(), serde_json::to_value(&graph.edges)?),
            ("cycles".to_string(), serde_json::to_value(&graph.cycles)?),
        ],
    )?);

    documents.push(json_document(
        "semantic_analysis",
        "semantic_analysis.json",
        SCHEMA_SEMANTIC_ANALYSIS,
        &repo,
        &spec.run_timestamp,
        [("records".to_string(), serde_json::to_value(records)?)],
    )?);

    documents.push(json_document(
        "gaps",
        "gaps.json",
        SCHEMA_GAPS,
        &repo,
        &spec.run_timestamp,
        [
            (
                "risks_or_gaps".to_string(),
                Value::Array(collect_risks(graph, records)),
            ),
            (
                "salvaged_batches".to_string(),
                json!(records.iter().filter(|r| !r.ok).count()),
            ),
        ],
    )?);

    documents.push(json_document(
        "architecture",
        "architecture.json",
        SCHEMA_ARCHITECTURE,
        &repo,
        &spec.run_timestamp,
        [
            ("modules".to_string(), Value::Array(module_summaries(records))),
            (
                "coverage".to_string(),
                json!({
                    "files_scanned": index.counts.files_scanned,
                    "files_included": index.counts.files_included,
                    "files_skipped": index.counts.files_skipped,
                    "edges": graph.edges.len(),
                    "unresolved_edges": graph.unresolved_edges().count(),
                    "cycles": graph.cycles.len(),
                }),
            ),
        ],
    )?);

    documents.push(Document {
        name: "onboarding".to_string(),
        relative_path: "onboarding.md".to_string(),
        bytes: super::onboarding::generate(spec, index, graph, records).into_bytes(),
    });

    Ok(documents)
}

/// Aggregated risks: model-reported risks from usable records plus the
/// structural gaps Pass 1 found on its own.
fn collect_risks(graph: &DependencyGraph, records: &[SemanticRecord]) -> Vec<Value> {
    let mut risks: Vec<String> = Vec::new();

    for record in records.iter().filter(|r| r.ok) {
        for risk in &record.risks {
            risks.push(risk.clone());
        }
    }

    for edge in graph.unresolved_edges() {
        risks.push(format!(
            "unresolved dependency: {} -> {}",
            edge.from_path, edge.to_path
        ));
    }

    risks.sort();
    risks.dedup();
    risks.into_iter().map(Value::String).collect()
}

fn module_summaries(records: &[SemanticRecord]) -> Vec<Value> {
    records
        .iter()
        .map(|record| {
            json!({
                "target": record.target,
                "ok": record.ok,
                "summary": record.summary,
                "risks": record.risks,
            })
        })
        .collect()
}

/// Assemble one JSON document with fingerprint and trailing newline.
fn json_document<const N: usize>(
    name: &str,
    relative_path: &str,
    schema_version: &str,
    repo: &Value,
    generated_at: &str,
    payload: [(String, Value); N],
) -> Result<Document> {
    let mut stable = Map::new();
    stable.insert("schema_version".to_string(), json!(schema_version));
    stable.insert("repo".to_string(), repo.clone());
    for (key, value) in payload {
        stable.insert(key, value);
    }

    // Fingerprint covers everything except the timestamp itself
    let fingerprint = sha256_hex(&serde_json::to_vec(&Value::Object(stable.clone()))?);

    stable.insert("generated_at".to_string(), json!(generated_at));
    stable.insert("fingerprint_sha256".to_string(), json!(fingerprint));

    let mut bytes = serde_json::to_vec_pretty(&Value::Object(stable))?;
    bytes.push(b'\n');

    Ok(Document {
        name: name.to_string(),
        relative_path: relative_path.to_string(),
        bytes,
    })
}
