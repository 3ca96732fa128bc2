//! Extractor — the entry point handlers call.
//!
//! Flow: validate config + input → Prompt Builder → Fallback Orchestrator
//!       (Transport → Classifier → Sanitizer → Normalizer per attempt) → result.
//!
//! Only `ExtractError` (fatal, zero attempts) is returned as an error; chain
//! failures come back as an unsuccessful `ExtractionResult` with its trail.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::extraction::diagnostics::ExtractionResult;
use crate::extraction::normalizer::{normalize, NormalizeError, NormalizedRecord};
use crate::extraction::orchestrator::Orchestrator;
use crate::extraction::prompt_builder::{
    extraction_prompt, rewrite_prompt, RewriteKind, SchemaVersion,
};
use crate::extraction::rewrite::clean_rewrite;
use crate::extraction::sanitizer::{parse_answer, SanitizeError};
use crate::llm_client::Credential;

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    ClientInput(String),
}

#[derive(Debug, Error)]
enum EvaluationError {
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error("schema mismatch: {0}")]
    Normalize(#[from] NormalizeError),
}

/// One incoming extraction call. Immutable once built.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub source_text: String,
    pub schema_version: SchemaVersion,
    /// Overall budget; can only shorten the configured default.
    pub deadline: Option<Duration>,
}

#[derive(Clone)]
pub struct Extractor {
    orchestrator: Orchestrator,
    credential: Option<Credential>,
    default_deadline: Duration,
}

impl Extractor {
    pub fn new(
        orchestrator: Orchestrator,
        credential: Option<Credential>,
        default_deadline: Duration,
    ) -> Self {
        Self {
            orchestrator,
            credential,
            default_deadline,
        }
    }

    pub async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<ExtractionResult<NormalizedRecord>, ExtractError> {
        let credential = self.credential()?;
        let source_text = request.source_text.as_str();
        if source_text.trim().is_empty() {
            return Err(ExtractError::ClientInput(
                "sourceText is required and must not be empty".to_string(),
            ));
        }

        let prompt = extraction_prompt(source_text, request.schema_version);
        let deadline = self.deadline(request.deadline);
        let span = info_span!(
            "extract",
            request_id = %Uuid::new_v4(),
            source_chars = source_text.chars().count(),
            schema = ?request.schema_version
        );

        span.in_scope(|| info!("Starting extraction"));
        let result = self
            .orchestrator
            .run(&prompt, credential, deadline, evaluate_extraction)
            .instrument(span.clone())
            .await;
        span.in_scope(|| log_result(&result));
        Ok(result)
    }

    pub async fn rewrite(
        &self,
        text: &str,
        kind: RewriteKind,
        deadline: Option<Duration>,
    ) -> Result<ExtractionResult<String>, ExtractError> {
        let credential = self.credential()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractError::ClientInput(
                "text is required and must not be empty".to_string(),
            ));
        }

        let prompt = rewrite_prompt(text, kind);
        let deadline = self.deadline(deadline);
        let span = info_span!("rewrite", request_id = %Uuid::new_v4(), kind = ?kind);

        let result = self
            .orchestrator
            .run(&prompt, credential, deadline, clean_rewrite)
            .instrument(span.clone())
            .await;
        span.in_scope(|| log_result(&result));
        Ok(result)
    }

    fn credential(&self) -> Result<&Credential, ExtractError> {
        self.credential.as_ref().ok_or_else(|| {
            ExtractError::Configuration("upstream API key is not configured".to_string())
        })
    }

    fn deadline(&self, requested: Option<Duration>) -> Instant {
        let budget = requested
            .map(|d| d.min(self.default_deadline))
            .unwrap_or(self.default_deadline);
        Instant::now() + budget
    }
}

fn evaluate_extraction(answer: &str) -> Result<NormalizedRecord, EvaluationError> {
    let value = parse_answer(answer)?;
    Ok(normalize(value)?)
}

fn log_result<T>(result: &ExtractionResult<T>) {
    if result.success {
        info!(attempts = result.attempts.len(), "Upstream call succeeded");
    } else {
        warn!(
            attempts = result.attempts.len(),
            error = result.final_error.as_deref().unwrap_or_default(),
            "Upstream call failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::extraction::classifier::OutcomeCategory;
    use crate::extraction::orchestrator::tests::{
        candidates, ok_body, status, ScriptedTransport,
    };
    use crate::extraction::policy::RetryPolicy;
    use crate::extraction::rate_limit::RateLimiter;
    use crate::llm_client::candidates::CandidateRegistry;
    use crate::llm_client::TransportOutcome;

    fn extractor(
        script: Vec<TransportOutcome>,
        credential: Option<Credential>,
    ) -> (Extractor, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(script));
        let orchestrator = Orchestrator::new(
            Arc::new(CandidateRegistry::new(candidates(&["a", "b"])).unwrap()),
            transport.clone(),
            Arc::new(RateLimiter::new(1000, 4)),
            RetryPolicy::default(),
            Duration::from_secs(30),
        );
        (
            Extractor::new(orchestrator, credential, Duration::from_secs(90)),
            transport,
        )
    }

    fn request(text: &str) -> ExtractionRequest {
        ExtractionRequest {
            source_text: text.to_string(),
            schema_version: SchemaVersion::V1,
            deadline: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_source_text_is_client_error_without_attempts() {
        let (extractor, transport) = extractor(vec![], Credential::new("key"));
        for text in ["", "   \n\t"] {
            let err = extractor.extract(request(text)).await.unwrap_err();
            assert!(matches!(err, ExtractError::ClientInput(_)));
        }
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credential_is_configuration_error_without_attempts() {
        let (extractor, transport) = extractor(vec![], None);
        let err = extractor.extract(request("Ada Lovelace")).await.unwrap_err();
        assert!(matches!(err, ExtractError::Configuration(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_returns_normalized_record() {
        let (extractor, _) = extractor(
            vec![
                status(404),
                ok_body(r#"{"profile":{"firstname":"Ada","years_experience":7}}"#),
            ],
            Credential::new("key"),
        );
        let result = extractor.extract(request("Ada Lovelace")).await.unwrap();
        assert!(result.success);
        assert_eq!(result.attempts.len(), 2);
        let data = result.data.unwrap();
        assert_eq!(data.profile.firstname, "Ada");
        assert_eq!(data.profile.years_experience, "7");
        assert!(data.experiences.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_text_reaches_prompt_untrimmed() {
        let (extractor, transport) = extractor(
            vec![ok_body(r#"{"profile":{"firstname":"Ada"}}"#)],
            Credential::new("key"),
        );
        let source = "  Ada Lovelace\n\tAnalyst  \n";
        let result = extractor.extract(request(source)).await.unwrap();
        assert!(result.success);
        assert!(transport.prompts()[0].ends_with(source));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requested_deadline_cannot_extend_default() {
        let (extractor, _) = extractor(vec![], Credential::new("key"));
        let start = Instant::now();
        let deadline = extractor.deadline(Some(Duration::from_secs(3600)));
        assert_eq!(deadline - start, Duration::from_secs(90));
        let deadline = extractor.deadline(Some(Duration::from_secs(5)));
        assert_eq!(deadline - start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewrite_cleans_answer() {
        let (extractor, transport) = extractor(
            vec![ok_body("Voici la version :\n\"**Réduit** les coûts de 30%\"")],
            Credential::new("key"),
        );
        let result = extractor
            .rewrite("reduced costs", RewriteKind::Bullet, None)
            .await
            .unwrap();
        assert_eq!(result.data.as_deref(), Some("Réduit les coûts de 30%"));
        // Plain-text mode never sends the JSON hint.
        assert!(transport.calls().iter().all(|(_, hint)| !hint));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewrite_empty_answer_is_malformed() {
        let (extractor, _) = extractor(
            vec![ok_body("\"\""), ok_body("\"**\"**")],
            Credential::new("key"),
        );
        let result = extractor
            .rewrite("text", RewriteKind::Summary, None)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result
            .attempts
            .iter()
            .all(|a| a.outcome_category == OutcomeCategory::MalformedResponse));
    }
}
