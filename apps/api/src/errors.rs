use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extraction::classifier::OutcomeCategory;
use crate::extraction::diagnostics::{Attempt, ExtractionResult};
use crate::extraction::extractor::ExtractError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The fallback chain ended without data. Carries the full diagnostic trail.
    #[error("Extraction failed: {final_error}")]
    Extraction {
        status: StatusCode,
        final_error: String,
        attempts: Vec<Attempt>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ExtractError> for AppError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::ClientInput(msg) => AppError::Validation(msg),
            ExtractError::Configuration(msg) => AppError::Configuration(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    /// Builds the failure response for an unsuccessful chain.
    pub fn from_failed<T>(result: ExtractionResult<T>) -> Self {
        let status = result
            .dominant_category()
            .map(failure_status)
            .unwrap_or(StatusCode::BAD_GATEWAY);
        AppError::Extraction {
            status,
            final_error: result
                .final_error
                .unwrap_or_else(|| "Extraction failed".to_string()),
            attempts: result.attempts,
        }
    }
}

/// HTTP-equivalent status for the last dominant failure category.
pub fn failure_status(category: OutcomeCategory) -> StatusCode {
    match category {
        OutcomeCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        OutcomeCategory::DeadlineExceeded | OutcomeCategory::NetworkFailure => {
            StatusCode::GATEWAY_TIMEOUT
        }
        OutcomeCategory::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        OutcomeCategory::UpstreamError
        | OutcomeCategory::MalformedResponse
        | OutcomeCategory::Success => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Extraction {
                status,
                final_error,
                attempts,
            } => {
                tracing::warn!(%status, "Extraction failed: {final_error}");
                let body = Json(json!({
                    "error": final_error,
                    "attempts": attempts,
                }));
                return (status, body).into_response();
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE_ENTITY", msg)
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "The extraction service is not configured".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::extraction::diagnostics::TerminalFailure;

    fn failed(categories: &[OutcomeCategory]) -> ExtractionResult<()> {
        let attempts = categories
            .iter()
            .map(|c| Attempt {
                candidate_id: "a".to_string(),
                started_at: Utc::now(),
                outcome_category: *c,
                http_status: None,
                raw_error_text: None,
            })
            .collect();
        ExtractionResult::failed(TerminalFailure::AllCandidatesExhausted, attempts)
    }

    #[test]
    fn test_status_follows_last_attempt() {
        let err = AppError::from_failed(failed(&[
            OutcomeCategory::Unavailable,
            OutcomeCategory::RateLimited,
        ]));
        assert!(matches!(
            err,
            AppError::Extraction { status, .. } if status == StatusCode::TOO_MANY_REQUESTS
        ));
    }

    #[test]
    fn test_failure_status_mapping() {
        assert_eq!(
            failure_status(OutcomeCategory::DeadlineExceeded),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            failure_status(OutcomeCategory::Unavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            failure_status(OutcomeCategory::MalformedResponse),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_fatal_errors_map_to_400_and_500() {
        let response = AppError::Validation("bad body".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response =
            AppError::from(ExtractError::ClientInput("empty".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response =
            AppError::from(ExtractError::Configuration("no key".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
