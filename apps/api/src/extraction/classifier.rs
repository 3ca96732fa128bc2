//! Response Classifier — maps one raw transport outcome to exactly one category.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::llm_client::{answer_text, truncate_for_diagnostics, TransportOutcome};

/// Outcome category of a single attempt.
///
/// `DeadlineExceeded` is a pseudo-category: it is never produced by the classifier,
/// only by the orchestrator when the overall budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeCategory {
    Success,
    RateLimited,
    Unavailable,
    UpstreamError,
    NetworkFailure,
    MalformedResponse,
    DeadlineExceeded,
}

impl OutcomeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeCategory::Success => "Success",
            OutcomeCategory::RateLimited => "RateLimited",
            OutcomeCategory::Unavailable => "Unavailable",
            OutcomeCategory::UpstreamError => "UpstreamError",
            OutcomeCategory::NetworkFailure => "NetworkFailure",
            OutcomeCategory::MalformedResponse => "MalformedResponse",
            OutcomeCategory::DeadlineExceeded => "DeadlineExceeded",
        }
    }
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Success {
        status: u16,
        answer: String,
    },
    Failure {
        category: OutcomeCategory,
        http_status: Option<u16>,
        message: Option<String>,
    },
}

pub fn classify_status(status: u16) -> OutcomeCategory {
    match status {
        200..=299 => OutcomeCategory::Success,
        429 => OutcomeCategory::RateLimited,
        408 => OutcomeCategory::UpstreamError,
        400..=499 => OutcomeCategory::Unavailable,
        _ => OutcomeCategory::UpstreamError,
    }
}

pub fn classify(outcome: &TransportOutcome) -> Classification {
    match outcome {
        TransportOutcome::TimedOut { after } => Classification::Failure {
            category: OutcomeCategory::NetworkFailure,
            http_status: None,
            message: Some(format!("timed out after {}ms", after.as_millis())),
        },
        TransportOutcome::NetworkError { message } => Classification::Failure {
            category: OutcomeCategory::NetworkFailure,
            http_status: None,
            message: Some(truncate_for_diagnostics(message)),
        },
        TransportOutcome::Response { status, body } => match classify_status(*status) {
            OutcomeCategory::Success => match answer_text(body) {
                Some(answer) => Classification::Success {
                    status: *status,
                    answer,
                },
                None => Classification::Failure {
                    category: OutcomeCategory::MalformedResponse,
                    http_status: Some(*status),
                    message: Some(if body.trim().is_empty() {
                        "empty response body".to_string()
                    } else {
                        "response envelope carried no answer text".to_string()
                    }),
                },
            },
            category => Classification::Failure {
                category,
                http_status: Some(*status),
                message: (!body.trim().is_empty()).then(|| truncate_for_diagnostics(body)),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn response(status: u16, body: &str) -> TransportOutcome {
        TransportOutcome::Response {
            status,
            body: body.to_string(),
        }
    }

    fn category_of(outcome: &TransportOutcome) -> OutcomeCategory {
        match classify(outcome) {
            Classification::Success { .. } => OutcomeCategory::Success,
            Classification::Failure { category, .. } => category,
        }
    }

    const OK_BODY: &str = r#"{"candidates":[{"content":{"parts":[{"text":"{}"}]}}]}"#;

    #[test]
    fn test_success_with_answer() {
        match classify(&response(200, OK_BODY)) {
            Classification::Success { status, answer } => {
                assert_eq!(status, 200);
                assert_eq!(answer, "{}");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_2xx_without_body_is_malformed() {
        assert_eq!(
            category_of(&response(200, "")),
            OutcomeCategory::MalformedResponse
        );
        assert_eq!(
            category_of(&response(200, r#"{"candidates":[]}"#)),
            OutcomeCategory::MalformedResponse
        );
    }

    #[test]
    fn test_rate_limited() {
        assert_eq!(category_of(&response(429, "quota")), OutcomeCategory::RateLimited);
    }

    #[test]
    fn test_unavailable_statuses() {
        for status in [400, 401, 403, 404, 405, 422] {
            assert_eq!(
                category_of(&response(status, "")),
                OutcomeCategory::Unavailable,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_upstream_error_statuses() {
        for status in [408, 500, 502, 503, 504] {
            assert_eq!(
                category_of(&response(status, "")),
                OutcomeCategory::UpstreamError,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_network_failures() {
        assert_eq!(
            category_of(&TransportOutcome::TimedOut {
                after: Duration::from_secs(30)
            }),
            OutcomeCategory::NetworkFailure
        );
        assert_eq!(
            category_of(&TransportOutcome::NetworkError {
                message: "connection refused".to_string()
            }),
            OutcomeCategory::NetworkFailure
        );
    }

    #[test]
    fn test_failure_keeps_status_and_body() {
        match classify(&response(404, "model not found")) {
            Classification::Failure {
                http_status,
                message,
                ..
            } => {
                assert_eq!(http_status, Some(404));
                assert_eq!(message.as_deref(), Some("model not found"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_category_serializes_as_name() {
        assert_eq!(
            serde_json::to_string(&OutcomeCategory::RateLimited).unwrap(),
            "\"RateLimited\""
        );
        assert_eq!(OutcomeCategory::Unavailable.to_string(), "Unavailable");
    }
}
