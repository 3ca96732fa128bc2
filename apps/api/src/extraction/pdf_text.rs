//! PDF → text collaborator for the upload endpoint.
//!
//! Parsing is CPU-bound and must run inside `tokio::task::spawn_blocking`.

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum PdfTextError {
    #[error("uploaded file is not a PDF")]
    NotAPdf,

    #[error("could not read PDF: {0}")]
    Unreadable(String),

    #[error("PDF text extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub async fn extract_pdf_text(data: Bytes) -> Result<String, PdfTextError> {
    if !data.starts_with(PDF_MAGIC) {
        return Err(PdfTextError::NotAPdf);
    }
    let size = data.len();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await?
        .map_err(|e| PdfTextError::Unreadable(e.to_string()))?;
    debug!(bytes = size, chars = text.len(), "Extracted text from PDF");
    Ok(text)
}
