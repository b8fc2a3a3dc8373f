//! Onboarding Document
//!
//! The one narrative artifact in the bundle: a human-readable orientation
//! text generated from the structured documents. Everything here is derived
//! from index/graph/record data, so the output is as deterministic as its
//! inputs.

use crate::types::{DependencyGraph, JobSpec, RepoIndex, SemanticRecord};

/// Generate the onboarding markdown for a run.
pub fn generate(
    spec: &JobSpec,
    index: &RepoIndex,
    graph: &DependencyGraph,
    records: &[SemanticRecord],
) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Onboarding: {}\n\n", spec.repo_identifier));
    md.push_str(&format!(
        "Snapshot taken at `{}`. This document orients a new contributor using \
         the structural scan and the model-assisted analysis in this bundle.\n\n",
        spec.run_timestamp
    ));

    // ---- Repository shape ----
    md.push_str("## Repository shape\n\n");
    md.push_str(&format!(
        "- {} files scanned, {} indexed as text, {} skipped (binary/oversized/excluded)\n",
        index.counts.files_scanned, index.counts.files_included, index.counts.files_skipped
    ));

    let dirs: Vec<String> = index
        .top_level_dirs()
        .into_iter()
        .filter(|d| !d.is_empty())
        .collect();
    if !dirs.is_empty() {
        md.push_str(&format!("- Top-level directories: {}\n", dirs.join(", ")));
    }
    md.push_str(&format!(
        "- {} internal dependency edges ({} unresolved), {} cycle(s)\n\n",
        graph.edges.len(),
        graph.unresolved_edges().count(),
        graph.cycles.len()
    ));

    // ---- Module summaries ----
    md.push_str("## Module groups\n\n");
    let usable: Vec<&SemanticRecord> = records.iter().filter(|r| r.ok).collect();
    if usable.is_empty() {
        md.push_str(
            "No usable semantic analysis is available for this run; see \
             `semantic_analysis.json` for salvage details.\n\n",
        );
    } else {
        for record in &usable {
            md.push_str(&format!("### {}\n\n", record.target));
            if record.summary.is_empty() {
                md.push_str("_No summary produced._\n\n");
            } else {
                md.push_str(&format!("{}\n\n", record.summary));
            }
        }
    }

    let salvaged = records.iter().filter(|r| !r.ok).count();
    if salvaged > 0 {
        md.push_str(&format!(
            "_{} module group(s) could not be analyzed this run; their raw model \
             output is preserved in `semantic_analysis.json`._\n\n",
            salvaged
        ));
    }

    // ---- Risks ----
    let mut risks: Vec<&str> = usable
        .iter()
        .flat_map(|r| r.risks.iter().map(|s| s.as_str()))
        .collect();
    risks.sort();
    risks.dedup();

    if !risks.is_empty() || graph.unresolved_edges().count() > 0 {
        md.push_str("## Risks and gaps\n\n");
        for risk in risks {
            md.push_str(&format!("- {}\n", risk));
        }
        for edge in graph.unresolved_edges() {
            md.push_str(&format!(
                "- `{}` imports `{}`, which resolves to nothing in this tree\n",
                edge.from_path, edge.to_path
            ));
        }
        md.push('\n');
    }

    // ---- Cycles ----
    if !graph.cycles.is_empty() {
        md.push_str("## Dependency cycles\n\n");
        for cycle in &graph.cycles {
            md.push_str(&format!("- {}\n", cycle.join(" -> ")));
        }
        md.push('\n');
    }

    // ---- Pointers ----
    md.push_str("## Where to look next\n\n");
    md.push_str("- `repo_index.json` - every scanned file with hashes and symbols\n");
    md.push_str("- `dependency_graph.json` - resolved and unresolved reference edges\n");
    md.push_str("- `architecture.json` - per-group structural summaries\n");
    md.push_str("- `gaps.json` - aggregated risks and gaps\n");

    md
}
