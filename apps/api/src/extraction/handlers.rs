//! Axum route handlers for the Extraction API.

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::extraction::diagnostics::ExtractionResult;
use crate::extraction::extractor::ExtractionRequest;
use crate::extraction::normalizer::NormalizedRecord;
use crate::extraction::pdf_text::{extract_pdf_text, PdfTextError};
use crate::extraction::prompt_builder::{RewriteKind, SchemaVersion};
use crate::state::AppState;

/// Number of upstream attempts it took to produce the record.
pub const ATTEMPTS_HEADER: &str = "x-extraction-attempts";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractBody {
    /// Missing and empty are both rejected by the extractor, with the same error.
    #[serde(default, alias = "text")]
    pub source_text: Option<String>,
    #[serde(default)]
    pub schema_version: SchemaVersion,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: RewriteKind,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub result: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/extract
pub async fn handle_extract(
    State(state): State<AppState>,
    body: Result<Json<ExtractBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body?;
    let request = ExtractionRequest {
        source_text: body.source_text.unwrap_or_default(),
        schema_version: body.schema_version,
        deadline: deadline_from_millis(body.deadline_ms),
    };
    record_response(state.extractor.extract(request).await?)
}

/// POST /api/v1/extract/pdf (multipart, field `file`)
pub async fn handle_extract_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
            upload = Some(data);
            break;
        }
    }
    let data = upload.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;

    let source_text = extract_pdf_text(data).await.map_err(|e| match e {
        PdfTextError::Join(e) => AppError::Internal(e.into()),
        other => AppError::UnprocessableEntity(other.to_string()),
    })?;

    let request = ExtractionRequest {
        source_text,
        schema_version: SchemaVersion::default(),
        deadline: None,
    };
    record_response(state.extractor.extract(request).await?)
}

/// POST /api/v1/rewrite
pub async fn handle_rewrite(
    State(state): State<AppState>,
    body: Result<Json<RewriteBody>, JsonRejection>,
) -> Result<Json<RewriteResponse>, AppError> {
    let Json(body) = body?;
    let text = body.text.unwrap_or_default();
    let mut result = state
        .extractor
        .rewrite(&text, body.kind, deadline_from_millis(body.deadline_ms))
        .await?;
    match result.data.take() {
        Some(rewritten) if result.success => Ok(Json(RewriteResponse { result: rewritten })),
        _ => Err(AppError::from_failed(result)),
    }
}

fn record_response(mut result: ExtractionResult<NormalizedRecord>) -> Result<Response, AppError> {
    match result.data.take() {
        Some(record) if result.success => {
            let attempts = result.attempts.len().to_string();
            Ok(([(ATTEMPTS_HEADER, attempts)], Json(record)).into_response())
        }
        _ => Err(AppError::from_failed(result)),
    }
}

fn deadline_from_millis(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|ms| *ms > 0).map(Duration::from_millis)
}
