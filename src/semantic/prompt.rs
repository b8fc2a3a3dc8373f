//! Prompt Construction
//!
//! Builds the deterministic analysis prompt for one batch. The payload is a
//! JSON document with sorted keys (serde_json's default map ordering), so
//! identical inputs always serialize to identical prompt bytes - a
//! requirement for the pipeline's byte-level determinism property.

use serde_json::{Value, json};

use super::batch::Batch;
use crate::types::{DependencyGraph, RepoIndex};

/// Expected response shape, embedded in every prompt
fn response_schema() -> Value {
    json!({
        "summary": "string - architectural summary of this module group",
        "risks": ["string - risk or gap observed in this module group"],
    })
}

/// Build the analysis prompt for one batch.
pub fn build_prompt(batch: &Batch, index: &RepoIndex, graph: &DependencyGraph) -> String {
    let mut files = serde_json::Map::new();
    for path in &batch.files {
        if let Some(record) = index.files.get(path) {
            files.insert(
                path.clone(),
                json!({
                    "language": record.language_guess,
                    "size_bytes": record.size_bytes,
                    "imports": record.imported_symbols,
                    "exports": record.exported_symbols,
                }),
            );
        }
    }

    // Edges with at least one endpoint in the batch, in graph (sorted) order
    let batch_paths: std::collections::BTreeSet<&str> =
        batch.files.iter().map(|s| s.as_str()).collect();

    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for edge in &graph.edges {
        let touches = batch_paths.contains(edge.from_path.as_str())
            || batch_paths.contains(edge.to_path.as_str());
        if !touches {
            continue;
        }
        let entry = json!({"from": edge.from_path, "to": edge.to_path});
        if edge.is_resolved() {
            resolved.push(entry);
        } else {
            unresolved.push(entry);
        }
    }

    let payload = json!({
        "task": "Analyze the architecture of one module group of a repository. \
                 Use only the structural evidence provided: file records and dependency edges.",
        "target": batch.target.to_string(),
        "schema": response_schema(),
        "files": Value::Object(files),
        "dependencies": {
            "resolved": resolved,
            "unresolved": unresolved,
        },
        "rules": [
            "Output a single JSON object matching the schema. No markdown, no commentary.",
            "Reference only files present in the provided records.",
            "summary: one concise paragraph on the group's role and structure.",
            "risks: bullet-point style strings; unresolved dependencies are candidate risks.",
            "If evidence is insufficient, say so in the summary and keep risks empty.",
        ],
    });

    // Sorted-key serialization; pretty form keeps the prompt readable in
    // salvage artifacts
    serde_json::to_string_pretty(&payload).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::batch::{BatchConfig, plan_batches};
    use crate::types::{DependencyEdge, EdgeKind, FileRecord};

    fn sample_index() -> RepoIndex {
        let mut index = RepoIndex::default();
        for (path, imports) in [
            ("src/a.rs", vec!["crate::b".to_string()]),
            ("src/b.rs", vec![]),
        ] {
            index.files.insert(
                path.to_string(),
                FileRecord {
                    relative_path: path.to_string(),
                    size_bytes: 50,
                    language_guess: "rust".to_string(),
                    content_hash: "h".to_string(),
                    imported_symbols: imports,
                    exported_symbols: vec!["thing".to_string()],
                },
            );
        }
        index
    }

    fn sample_graph() -> DependencyGraph {
        DependencyGraph {
            edges: vec![
                DependencyEdge {
                    from_path: "src/a.rs".into(),
                    to_path: "src/b.rs".into(),
                    kind: EdgeKind::Import,
                },
                DependencyEdge {
                    from_path: "src/a.rs".into(),
                    to_path: "phantom".into(),
                    kind: EdgeKind::Unresolved,
                },
            ],
            cycles: vec![],
        }
    }

    #[test]
    fn test_prompt_embeds_records_and_edges() {
        let index = sample_index();
        let graph = sample_graph();
        let batches = plan_batches(&index, &BatchConfig::default());

        let prompt = build_prompt(&batches[0], &index, &graph);
        assert!(prompt.contains("src/a.rs"));
        assert!(prompt.contains("src/b.rs"));
        assert!(prompt.contains("phantom"));
        assert!(prompt.contains("dir:src"));
        assert!(prompt.contains("\"risks\""));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let index = sample_index();
        let graph = sample_graph();
        let batches = plan_batches(&index, &BatchConfig::default());

        let first = build_prompt(&batches[0], &index, &graph);
        let second = build_prompt(&batches[0], &index, &graph);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unrelated_edges_excluded() {
        let index = sample_index();
        let mut graph = sample_graph();
        graph.edges.push(DependencyEdge {
            from_path: "other/x.rs".into(),
            to_path: "other/y.rs".into(),
            kind: EdgeKind::Import,
        });

        let batches = plan_batches(&index, &BatchConfig::default());
        let prompt = build_prompt(&batches[0], &index, &graph);
        assert!(!prompt.contains("other/x.rs"));
    }
}
