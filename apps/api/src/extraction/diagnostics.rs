//! Diagnostic Aggregator — one record per attempt, one result per call.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extraction::classifier::OutcomeCategory;

/// Record of one try against one candidate. Never mutated after it is pushed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub candidate_id: String,
    pub started_at: DateTime<Utc>,
    pub outcome_category: OutcomeCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_error_text: Option<String>,
}

/// Why a chain ended without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminalFailure {
    AllCandidatesExhausted,
    DeadlineExceeded,
    /// The policy stopped the chain before the remaining candidates were tried.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub attempts: Vec<Attempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_error: Option<String>,
    #[serde(skip)]
    pub terminal: Option<TerminalFailure>,
}

impl<T> ExtractionResult<T> {
    pub fn succeeded(data: T, attempts: Vec<Attempt>) -> Self {
        Self {
            success: true,
            data: Some(data),
            attempts,
            final_error: None,
            terminal: None,
        }
    }

    pub fn failed(terminal: TerminalFailure, attempts: Vec<Attempt>) -> Self {
        let final_error = summarize(terminal, &attempts);
        Self {
            success: false,
            data: None,
            attempts,
            final_error: Some(final_error),
            terminal: Some(terminal),
        }
    }

    /// Category of the last attempt, which decides the caller-facing status.
    pub fn dominant_category(&self) -> Option<OutcomeCategory> {
        self.attempts.last().map(|a| a.outcome_category)
    }
}

/// `"{candidateId}: {category} ({httpStatus or message})"` per attempt, in order.
pub fn summarize(terminal: TerminalFailure, attempts: &[Attempt]) -> String {
    let headline = match terminal {
        TerminalFailure::AllCandidatesExhausted => "All candidates failed",
        TerminalFailure::DeadlineExceeded => "Deadline exceeded before a candidate succeeded",
        TerminalFailure::Aborted => "Fallback chain aborted before trying remaining candidates",
    };
    if attempts.is_empty() {
        return headline.to_string();
    }
    let lines: Vec<String> = attempts.iter().map(describe).collect();
    format!("{headline}: {}", lines.join("; "))
}

fn describe(attempt: &Attempt) -> String {
    let detail = match (attempt.http_status, attempt.raw_error_text.as_deref()) {
        (Some(status), _) => Some(status.to_string()),
        (None, Some(message)) => Some(message.to_string()),
        (None, None) => None,
    };
    match detail {
        Some(detail) => format!(
            "{}: {} ({detail})",
            attempt.candidate_id, attempt.outcome_category
        ),
        None => format!("{}: {}", attempt.candidate_id, attempt.outcome_category),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(id: &str, category: OutcomeCategory, status: Option<u16>, msg: Option<&str>) -> Attempt {
        Attempt {
            candidate_id: id.to_string(),
            started_at: Utc::now(),
            outcome_category: category,
            http_status: status,
            raw_error_text: msg.map(String::from),
        }
    }

    #[test]
    fn test_summary_lists_attempts_in_order() {
        let attempts = vec![
            attempt("a", OutcomeCategory::RateLimited, Some(429), Some("quota")),
            attempt("b", OutcomeCategory::NetworkFailure, None, Some("timed out after 30000ms")),
            attempt("c", OutcomeCategory::DeadlineExceeded, None, None),
        ];
        assert_eq!(
            summarize(TerminalFailure::AllCandidatesExhausted, &attempts),
            "All candidates failed: a: RateLimited (429); \
             b: NetworkFailure (timed out after 30000ms); c: DeadlineExceeded"
        );
    }

    #[test]
    fn test_failed_result_shape() {
        let result: ExtractionResult<()> = ExtractionResult::failed(
            TerminalFailure::AllCandidatesExhausted,
            vec![attempt("a", OutcomeCategory::Unavailable, Some(404), None)],
        );
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.dominant_category(), Some(OutcomeCategory::Unavailable));
        assert!(result.final_error.unwrap().contains("a: Unavailable (404)"));
    }

    #[test]
    fn test_aborted_chain_does_not_claim_all_candidates_failed() {
        let attempts = vec![attempt("a", OutcomeCategory::RateLimited, Some(429), None)];
        let summary = summarize(TerminalFailure::Aborted, &attempts);
        assert_eq!(
            summary,
            "Fallback chain aborted before trying remaining candidates: a: RateLimited (429)"
        );
    }

    #[test]
    fn test_attempt_serializes_camel_case() {
        let json = serde_json::to_value(attempt("a", OutcomeCategory::Unavailable, Some(404), None)).unwrap();
        assert_eq!(json["candidateId"], "a");
        assert_eq!(json["outcomeCategory"], "Unavailable");
        assert_eq!(json["httpStatus"], 404);
        assert!(json.get("rawErrorText").is_none());
    }

    #[test]
    fn test_succeeded_result_has_no_error() {
        let result = ExtractionResult::succeeded(1, vec![]);
        assert!(result.success);
        assert_eq!(result.data, Some(1));
        assert!(result.final_error.is_none());
        assert!(result.terminal.is_none());
    }
}
