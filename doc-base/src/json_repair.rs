//! Accept-and-repair JSON extraction for LLM output.
//!
//! Chat models wrap JSON in prose or markdown fences often enough that the
//! agent and QA paths must never throw on the raw text: this module extracts
//! the first JSON object or array from a response and leaves the fallback
//! decision to the caller.

use serde_json::Value;

/// Extracts the first parseable JSON object or array from `text`.
///
/// Tries, in order: the whole trimmed text, the contents of a markdown code
/// fence, and the first balanced `{...}` or `[...]` span.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() || v.is_array() {
            return Some(v);
        }
    }

    if let Some(inner) = fenced_block(trimmed) {
        if let Ok(v) = serde_json::from_str::<Value>(inner.trim()) {
            if v.is_object() || v.is_array() {
                return Some(v);
            }
        }
    }

    balanced_span(trimmed).and_then(|span| serde_json::from_str::<Value>(span).ok())
}

/// Contents of the first ``` fence, tolerating a language tag on the opener.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// The first balanced `{...}` or `[...]` span, string-aware.
fn balanced_span(text: &str) -> Option<&str> {
    let open_idx = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[open_idx] as char;
    let close = if open == '{' { '}' } else { ']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[open_idx..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open_idx..open_idx + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
