//! Dependency Grapher
//!
//! Derives a directed graph of intra-repo file references from the repo
//! index. Resolution is heuristic/lexical, matching the scanner's symbol
//! extraction - not a parse. This is a documented limitation: deterministic
//! tie-breaking depends on the same heuristic ordering being reproducible.
//!
//! Resolution order per import spec:
//! 1. exact relative path match
//! 2. same-directory match (extension probing)
//! 3. project-root-relative match (extension probing)
//! 4. unresolved - the edge is retained, never dropped
//!
//! Within a rule, the lexicographically first matching path wins. Anything
//! beyond these rules (symlinked paths, escaping `..` traversal) is recorded
//! as unresolved rather than guessing further resolution semantics.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, instrument};

use crate::types::{DependencyEdge, DependencyGraph, EdgeKind, RepoIndex};

/// Build the dependency graph from a frozen repo index.
#[instrument(skip(index), fields(files = index.len()))]
pub fn build_graph(index: &RepoIndex) -> DependencyGraph {
    let mut edges = Vec::new();

    for (from_path, record) in &index.files {
        for spec in &record.imported_symbols {
            let edge = match resolve(index, from_path, spec, &record.language_guess) {
                Some((to_path, kind)) => DependencyEdge {
                    from_path: from_path.clone(),
                    to_path,
                    kind,
                },
                None => DependencyEdge {
                    from_path: from_path.clone(),
                    to_path: spec.clone(),
                    kind: EdgeKind::Unresolved,
                },
            };
            edges.push(edge);
        }
    }

    // Self-imports carry no information; duplicate edges collapse
    edges.retain(|e| !(e.is_resolved() && e.from_path == e.to_path));
    edges.sort_by(|a, b| {
        (&a.from_path, &a.to_path).cmp(&(&b.from_path, &b.to_path))
    });
    edges.dedup();

    let cycles = find_cycles(&edges);
    debug!(edges = edges.len(), cycles = cycles.len(), "graph built");

    DependencyGraph { edges, cycles }
}

// =============================================================================
// Resolution
// =============================================================================

fn resolve(
    index: &RepoIndex,
    from_path: &str,
    spec: &str,
    language: &str,
) -> Option<(String, EdgeKind)> {
    let cleaned = clean_spec(spec, language)?;

    // Rule 1: the spec is already an exact index key
    if index.contains(&cleaned.path) {
        return Some((cleaned.path, EdgeKind::Import));
    }

    let candidates = candidate_paths(&cleaned.path, language);

    // Rule 2: same-directory match
    let from_dir = from_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    let mut same_dir: Vec<String> = candidates
        .iter()
        .filter_map(|c| normalize_join(from_dir, c))
        .filter(|p| index.contains(p))
        .collect();
    if !same_dir.is_empty() {
        same_dir.sort();
        return Some((same_dir.remove(0), EdgeKind::Import));
    }

    // Same-dir-only specs (e.g. python relative imports) stop here
    if cleaned.same_dir_only {
        return None;
    }

    // Rule 3: project-root-relative match
    let mut root_relative: Vec<String> = candidates
        .iter()
        .filter_map(|c| normalize_join("", c))
        .filter(|p| index.contains(p))
        .collect();
    if !root_relative.is_empty() {
        root_relative.sort();
        return Some((root_relative.remove(0), EdgeKind::Reference));
    }

    None
}

struct CleanedSpec {
    path: String,
    /// Relative import forms (leading-dot python) never match at the root
    same_dir_only: bool,
}

/// Normalize an import spec into a path-like string.
fn clean_spec(spec: &str, language: &str) -> Option<CleanedSpec> {
    let mut s = spec.trim().to_string();
    if s.is_empty() {
        return None;
    }

    let mut same_dir_only = false;

    if let Some(stripped) = s.strip_prefix("./") {
        s = stripped.to_string();
        same_dir_only = true;
    }

    match language {
        "rust" => {
            // `use crate::foo::bar` / `use self::foo` become path segments;
            // `std::...` and other external crates stay module-dotted and
            // will not match any index key
            if let Some(rest) = s.strip_prefix("crate::") {
                s = rest.replace("::", "/");
            } else if let Some(rest) = s.strip_prefix("self::") {
                s = rest.replace("::", "/");
                same_dir_only = true;
            } else {
                s = s.replace("::", "/");
            }
        }
        "python" => {
            let dots = s.len() - s.trim_start_matches('.').len();
            if dots > 0 {
                // Leading-dot relative imports resolve against the importing
                // file's directory; deeper `..` levels are out of scope
                if dots > 1 {
                    return None;
                }
                s = s.trim_start_matches('.').replace('.', "/");
                same_dir_only = true;
            } else if !s.contains('/') {
                s = s.replace('.', "/");
            }
        }
        "java" | "kotlin" | "csharp" => {
            if !s.contains('/') {
                s = s.replace('.', "/");
            }
        }
        _ => {}
    }

    if s.is_empty() {
        return None;
    }

    Some(CleanedSpec {
        path: s,
        same_dir_only,
    })
}

/// Candidate relative paths a cleaned spec may denote, in probe order.
fn candidate_paths(cleaned: &str, language: &str) -> Vec<String> {
    let mut out = vec![cleaned.to_string()];

    let exts: &[&str] = match language {
        "rust" => &["rs"],
        "python" => &["py"],
        "typescript" => &["ts", "tsx", "js", "jsx"],
        "javascript" => &["js", "jsx", "ts", "tsx"],
        "go" => &["go"],
        "java" => &["java"],
        "kotlin" => &["kt"],
        "ruby" => &["rb"],
        "c" | "cpp" => &["h", "hpp", "c", "cpp"],
        "shell" => &["sh"],
        _ => &[],
    };

    for ext in exts {
        out.push(format!("{}.{}", cleaned, ext));
    }

    // Directory entry points
    match language {
        "rust" => out.push(format!("{}/mod.rs", cleaned)),
        "python" => out.push(format!("{}/__init__.py", cleaned)),
        "typescript" | "javascript" => {
            out.push(format!("{}/index.ts", cleaned));
            out.push(format!("{}/index.js", cleaned));
        }
        _ => {}
    }

    out
}

/// Join `base` and `rel`, collapsing `.`/`..` segments.
/// Returns None if `..` would escape the repository root.
fn normalize_join(base: &str, rel: &str) -> Option<String> {
    let mut segments: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.split('/').collect()
    };

    for seg in rel.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

// =============================================================================
// Cycle Detection
// =============================================================================

/// Standard three-color DFS over the resolved-edge subgraph.
/// Cycles are reported, not treated as errors.
fn find_cycles(edges: &[DependencyEdge]) -> Vec<Vec<String>> {
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in edges.iter().filter(|e| e.is_resolved()) {
        adjacency
            .entry(edge.from_path.as_str())
            .or_default()
            .push(edge.to_path.as_str());
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut color: HashMap<&str, Color> = HashMap::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();
    let mut seen_cycles: HashSet<String> = HashSet::new();

    for &start in adjacency.keys() {
        if color.get(start).copied().unwrap_or(Color::White) != Color::White {
            continue;
        }

        // Iterative DFS: (node, next child index); `path` mirrors the gray stack
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        let mut path: Vec<&str> = vec![start];
        color.insert(start, Color::Gray);

        loop {
            let Some(&(node, idx)) = stack.last() else {
                break;
            };
            let children: &[&str] = adjacency.get(node).map(|v| v.as_slice()).unwrap_or(&[]);

            if idx < children.len() {
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                let child = children[idx];

                match color.get(child).copied().unwrap_or(Color::White) {
                    Color::White => {
                        color.insert(child, Color::Gray);
                        stack.push((child, 0));
                        path.push(child);
                    }
                    Color::Gray => {
                        if let Some(pos) = path.iter().position(|&n| n == child) {
                            let cycle = canonical_cycle(&path[pos..]);
                            let key = cycle.join("\u{0}");
                            if seen_cycles.insert(key) {
                                cycles.push(cycle);
                            }
                        }
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(node, Color::Black);
                stack.pop();
                path.pop();
            }
        }
    }

    cycles.sort();
    cycles
}

/// Rotate a cycle so its lexicographically smallest member comes first,
/// giving a canonical form for deduplication.
fn canonical_cycle(nodes: &[&str]) -> Vec<String> {
    let min_pos = nodes
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| **n)
        .map(|(i, _)| i)
        .unwrap_or(0);

    nodes[min_pos..]
        .iter()
        .chain(nodes[..min_pos].iter())
        .map(|s| s.to_string())
        .collect()
}
