//! Best-effort JSON scraping for model output. Providers wrap JSON in code
//! fences or explanatory prose despite instructions; this stays a pure
//! function so it can be fuzzed against malformed fixtures without touching
//! network code.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::LlmError;

lazy_static! {
    static ref FENCE_RE: Regex = Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap();
    static ref OBJECT_RE: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
    static ref ARRAY_RE: Regex = Regex::new(r"(?s)\[.*\]").unwrap();
}

/// Parse `raw` into `T`, tolerating Markdown fences and surrounding prose.
/// Tries, in order: fenced block, the whole text, the first top-level
/// `{...}` span, the first top-level `[...]` span.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let candidate = strip_code_fences(raw);

    if let Ok(v) = serde_json::from_str::<T>(candidate.trim()) {
        return Ok(v);
    }

    if let Some(m) = OBJECT_RE.find(&candidate) {
        if let Ok(v) = serde_json::from_str::<T>(m.as_str()) {
            return Ok(v);
        }
    }

    if let Some(m) = ARRAY_RE.find(&candidate) {
        if let Ok(v) = serde_json::from_str::<T>(m.as_str()) {
            return Ok(v);
        }
    }

    Err(LlmError::ParseFailed(format!(
        "no valid JSON in response ({} chars)",
        raw.len()
    )))
}

/// Returns the inside of the first fenced block, or the input unchanged.
fn strip_code_fences(raw: &str) -> String {
    match FENCE_RE.captures(raw) {
        Some(caps) => caps[1].to_string(),
        None => raw.to_string(),
    }
}
