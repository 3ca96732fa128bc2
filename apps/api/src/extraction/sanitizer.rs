//! Sanitizer / Parser — strips wrapper artifacts from an answer and parses it as JSON.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("no JSON object found in response")]
    NoObject,

    #[error("response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = if let Some(stripped) = text.strip_prefix("```json") {
        stripped
    } else if let Some(stripped) = text.strip_prefix("```JSON") {
        stripped
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
    } else {
        return text;
    };
    let inner = inner.trim_start();
    inner
        .strip_suffix("```")
        .map(|s| s.trim())
        .unwrap_or(inner)
}

/// Returns the slice from the first structural opener (`{` or `[`) to the
/// last matching closer.
///
/// Drops fences and any explanatory sentence before or after the value. A
/// top-level array is kept whole so the normalizer can reject it.
/// Applying it twice yields the same slice.
pub fn sanitize(text: &str) -> Option<&str> {
    let text = strip_json_fences(text);
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(closer)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn parse_answer(text: &str) -> Result<Value, SanitizeError> {
    let cleaned = sanitize(text).ok_or(SanitizeError::NoObject)?;
    Ok(serde_json::from_str(cleaned)?)
}
