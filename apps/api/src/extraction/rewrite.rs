//! Plain-text rewrite of a single CV bullet or summary.
//!
//! Runs through the same fallback chain as extraction; only the evaluator differs.

use thiserror::Error;

const PREAMBLE_OPENERS: &[&str] = &["voici", "here is", "here's", "sure"];
/// A preamble longer than this is probably the answer itself.
const MAX_PREAMBLE_CHARS: usize = 120;

#[derive(Debug, Error, PartialEq)]
pub enum RewriteError {
    #[error("rewrite was empty after cleanup")]
    Empty,
}

/// Strips emphasis markers, a leading "Here is …:" line and surrounding quotes.
pub fn clean_rewrite(answer: &str) -> Result<String, RewriteError> {
    let text = answer.replace("**", "");
    let text = strip_preamble(text.trim());
    let text = strip_quotes(text.trim()).trim();
    if text.is_empty() {
        return Err(RewriteError::Empty);
    }
    Ok(text.to_string())
}

fn strip_preamble(text: &str) -> &str {
    let lower = text.to_lowercase();
    if !PREAMBLE_OPENERS.iter().any(|o| lower.starts_with(o)) {
        return text;
    }
    match text.find(':') {
        Some(pos) if text[..pos].chars().count() <= MAX_PREAMBLE_CHARS => text[pos + 1..].trim_start(),
        _ => text,
    }
}

fn strip_quotes(text: &str) -> &str {
    let text = text.strip_prefix('"').unwrap_or(text);
    text.strip_suffix('"').unwrap_or(text)
}
