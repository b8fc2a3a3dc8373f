//! Lexical Symbol Extraction
//!
//! Heuristic, line-oriented extraction of imported and exported symbols.
//! This is deliberately not a parse: the resolver's deterministic
//! tie-breaking depends on this heuristic ordering staying reproducible, so
//! unrecognized syntax degrades to empty symbol lists instead of failing.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::scan::MAX_SYMBOLS_PER_FILE;

/// Common source code extensions mapped to language names
const LANGUAGE_TABLE: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("py", "python"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("rb", "ruby"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("hpp", "cpp"),
    ("cs", "csharp"),
    ("swift", "swift"),
    ("php", "php"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("md", "markdown"),
    ("toml", "toml"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("json", "json"),
    ("html", "html"),
    ("css", "css"),
    ("sql", "sql"),
];

/// Guess the language from a relative path's extension
pub fn detect_language(relative_path: &str) -> &'static str {
    let ext = relative_path
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();

    LANGUAGE_TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
        .unwrap_or("text")
}

/// Result of the lexical pass over one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalScan {
    pub imported_symbols: Vec<String>,
    pub exported_symbols: Vec<String>,
}

static RUST_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([A-Za-z_][\w:]*)").unwrap());
static RUST_MOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+(\w+)\s*;").unwrap());
static RUST_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*pub(?:\([^)]*\))?\s+(?:async\s+)?(?:unsafe\s+)?(?:fn|struct|enum|trait|const|static|type|mod)\s+(\w+)").unwrap()
});

static PY_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+([\w.]+)").unwrap());
static PY_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*from\s+([\w.]+)\s+import").unwrap());
static PY_EXPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:async\s+)?(?:def|class)\s+(\w+)").unwrap());

static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:import\s[^'"]*?from\s*|import\s*\(\s*|require\s*\(\s*|import\s+)['"]([^'"]+)['"]"#)
        .unwrap()
});
static JS_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*export\s+(?:default\s+)?(?:abstract\s+)?(?:async\s+)?(?:function|class|const|let|var|interface|type|enum)\s+(\w+)").unwrap()
});

static GO_IMPORT_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*import\s+(?:\w+\s+)?"([^"]+)""#).unwrap());
static GO_IMPORT_BLOCK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(?:[\w.]+\s+)?"([^"]+)"\s*$"#).unwrap());
static GO_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:func\s+(?:\([^)]*\)\s+)?|type\s+|var\s+|const\s+)([A-Z]\w*)").unwrap()
});

static C_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*#\s*include\s*[<"]([^>"]+)[>"]"#).unwrap());

static JVM_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+(?:static\s+)?([\w.]+)").unwrap());
static JVM_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:public|open|data|sealed)?\s*(?:class|interface|enum|object|fun)\s+(\w+)")
        .unwrap()
});

static RUBY_REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*require(?:_relative)?\s+['"]([^'"]+)['"]"#).unwrap());
static RUBY_EXPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:def|class|module)\s+([\w.]+)").unwrap());

static SHELL_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:source|\.)\s+(\S+)").unwrap());

/// Extract imported/exported symbols from file content.
///
/// Unknown languages produce empty lists. Symbol order follows first
/// occurrence in the file; duplicates are dropped.
pub fn scan_symbols(language: &str, content: &str) -> LexicalScan {
    let mut scan = LexicalScan::default();

    match language {
        "rust" => {
            for line in content.lines() {
                capture_into(&RUST_USE, line, &mut scan.imported_symbols);
                capture_into(&RUST_MOD, line, &mut scan.imported_symbols);
                capture_into(&RUST_EXPORT, line, &mut scan.exported_symbols);
            }
        }
        "python" => {
            for line in content.lines() {
                capture_into(&PY_IMPORT, line, &mut scan.imported_symbols);
                capture_into(&PY_FROM, line, &mut scan.imported_symbols);
                capture_into(&PY_EXPORT, line, &mut scan.exported_symbols);
            }
        }
        "typescript" | "javascript" => {
            for line in content.lines() {
                capture_into(&JS_IMPORT, line, &mut scan.imported_symbols);
                capture_into(&JS_EXPORT, line, &mut scan.exported_symbols);
            }
        }
        "go" => {
            // Block imports need one line of state: `import (` ... `)`
            let mut in_import_block = false;
            for line in content.lines() {
                let trimmed = line.trim();
                if trimmed.starts_with("import (") {
                    in_import_block = true;
                    continue;
                }
                if in_import_block {
                    if trimmed.starts_with(')') {
                        in_import_block = false;
                    } else {
                        capture_into(&GO_IMPORT_BLOCK_LINE, line, &mut scan.imported_symbols);
                    }
                    continue;
                }
                capture_into(&GO_IMPORT_SINGLE, line, &mut scan.imported_symbols);
                capture_into(&GO_EXPORT, line, &mut scan.exported_symbols);
            }
        }
        "c" | "cpp" => {
            for line in content.lines() {
                capture_into(&C_INCLUDE, line, &mut scan.imported_symbols);
            }
        }
        "java" | "kotlin" | "csharp" => {
            for line in content.lines() {
                capture_into(&JVM_IMPORT, line, &mut scan.imported_symbols);
                capture_into(&JVM_EXPORT, line, &mut scan.exported_symbols);
            }
        }
        "ruby" => {
            for line in content.lines() {
                capture_into(&RUBY_REQUIRE, line, &mut scan.imported_symbols);
                capture_into(&RUBY_EXPORT, line, &mut scan.exported_symbols);
            }
        }
        "shell" => {
            for line in content.lines() {
                capture_into(&SHELL_SOURCE, line, &mut scan.imported_symbols);
            }
        }
        _ => {}
    }

    dedup_preserving_order(&mut scan.imported_symbols);
    dedup_preserving_order(&mut scan.exported_symbols);
    scan.imported_symbols.truncate(MAX_SYMBOLS_PER_FILE);
    scan.exported_symbols.truncate(MAX_SYMBOLS_PER_FILE);

    scan
}

fn capture_into(re: &Regex, line: &str, out: &mut Vec<String>) {
    if let Some(caps) = re.captures(line)
        && let Some(m) = caps.get(1)
    {
        out.push(m.as_str().to_string());
    }
}

fn dedup_preserving_order(symbols: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    symbols.retain(|s| seen.insert(s.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("src/main.rs"), "rust");
        assert_eq!(detect_language("app/page.tsx"), "typescript");
        assert_eq!(detect_language("setup.py"), "python");
        assert_eq!(detect_language("README.md"), "markdown");
        assert_eq!(detect_language("Makefile"), "text");
    }

    #[test]
    fn test_rust_symbols() {
        let content = r#"
use std::collections::HashMap;
use crate::types::Result;
pub mod scanner;
mod internal;

pub struct Scanner {
    root: PathBuf,
}

pub fn scan() {}
fn private_helper() {}
"#;
        let scan = scan_symbols("rust", content);
        assert_eq!(
            scan.imported_symbols,
            vec!["std::collections::HashMap", "crate::types::Result", "scanner", "internal"]
        );
        assert_eq!(scan.exported_symbols, vec!["scanner", "Scanner", "scan"]);
    }

    #[test]
    fn test_python_symbols() {
        let content = r#"
import os
from snapshotter.utils import sha256_bytes
from .job import Job

def generate(repo_dir):
    pass

class Pipeline:
    def run(self):
        pass
"#;
        let scan = scan_symbols("python", content);
        assert_eq!(scan.imported_symbols, vec!["os", "snapshotter.utils", ".job"]);
        // Indented methods are not top-level exports
        assert_eq!(scan.exported_symbols, vec!["generate", "Pipeline"]);
    }

    #[test]
    fn test_typescript_symbols() {
        let content = r#"
import { useState } from 'react';
import helper from "./lib/helper";
const lazy = require('./lazy');

export function render() {}
export default class App {}
export const VERSION = "1.0";
"#;
        let scan = scan_symbols("typescript", content);
        assert_eq!(scan.imported_symbols, vec!["react", "./lib/helper", "./lazy"]);
        assert_eq!(scan.exported_symbols, vec!["render", "App", "VERSION"]);
    }

    #[test]
    fn test_go_import_block() {
        let content = r#"
package main

import (
    "fmt"
    log "github.com/sirupsen/logrus"
)

import "os"

func Run() {}
type Config struct {}
"#;
        let scan = scan_symbols("go", content);
        assert_eq!(
            scan.imported_symbols,
            vec!["fmt", "github.com/sirupsen/logrus", "os"]
        );
        assert_eq!(scan.exported_symbols, vec!["Run", "Config"]);
    }

    #[test]
    fn test_c_includes() {
        let content = "#include <stdio.h>\n#include \"util.h\"\n";
        let scan = scan_symbols("c", content);
        assert_eq!(scan.imported_symbols, vec!["stdio.h", "util.h"]);
    }

    #[test]
    fn test_unknown_language_degrades_to_empty() {
        let scan = scan_symbols("text", "arbitrary { content ( with junk");
        assert!(scan.imported_symbols.is_empty());
        assert!(scan.exported_symbols.is_empty());
    }

    #[test]
    fn test_duplicates_dropped_order_kept() {
        let content = "import os\nimport sys\nimport os\n";
        let scan = scan_symbols("python", content);
        assert_eq!(scan.imported_symbols, vec!["os", "sys"]);
    }
}
