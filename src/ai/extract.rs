//! Model Output Extraction
//!
//! Pulls a JSON object out of raw model text. Handles markdown code fences,
//! JSON embedded in explanatory prose, and detects truncated output so the
//! caller can distinguish "model stopped early" from "model went off-script".
//! Extraction failures are reported as strings; the analyzer turns them into
//! salvage records rather than errors.

use serde_json::Value;

/// Attempt to parse a JSON object from raw model output.
///
/// Order: direct parse → code-fence strip → first-object span extraction.
/// The error string describes the failure, noting truncation when detected.
pub fn parse_json_object(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("model output was empty; expected a JSON object".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed)
        && value.is_object()
    {
        return Ok(value);
    }

    let unfenced = strip_code_fences(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(&unfenced)
        && value.is_object()
    {
        return Ok(value);
    }

    if let Some(span) = extract_first_json_object(&unfenced)
        && let Ok(value) = serde_json::from_str::<Value>(span)
        && value.is_object()
    {
        return Ok(value);
    }

    if looks_truncated(&unfenced) {
        return Err(format!(
            "model output looks truncated (unbalanced braces); first 200 chars: {}",
            preview(trimmed)
        ));
    }

    Err(format!(
        "no JSON object found in model output; first 200 chars: {}",
        preview(trimmed)
    ))
}

fn preview(s: &str) -> String {
    s.chars().take(200).collect()
}

/// Strip markdown code fences (```json ... ``` or ``` ... ```)
pub fn strip_code_fences(s: &str) -> String {
    let mut result = s.trim().to_string();

    if result.starts_with("```")
        && let Some(first_newline) = result.find('\n')
    {
        result = result[first_newline + 1..].to_string();
    }

    if result.ends_with("```") {
        result = result[..result.len() - 3].trim_end().to_string();
    }

    result.trim_start_matches('\u{feff}').trim().to_string()
}

/// Extract the first complete `{...}` span, respecting string literals
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let mut start = None;
    let mut in_string = false;
    let mut escape = false;
    let mut balance = 0i64;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if start.is_none() {
                    start = Some(i);
                }
                balance += 1;
            }
            '}' => {
                if start.is_some() {
                    balance -= 1;
                    if balance == 0 {
                        return Some(&text[start.unwrap()..i + ch.len_utf8()]);
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// Check whether output looks like a JSON object cut off mid-stream
pub fn looks_truncated(text: &str) -> bool {
    let s = text.trim();
    if s.is_empty() {
        return false;
    }
    if !s.ends_with('}') {
        return true;
    }

    let mut in_string = false;
    let mut escape = false;
    let mut balance = 0i64;

    for ch in s.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => balance += 1,
            '}' => balance -= 1,
            _ => {}
        }
    }

    balance != 0
}
