/// LLM Client — the single point of entry for all upstream completion calls.
///
/// ARCHITECTURAL RULE: No other module may talk to the completion service directly.
/// All upstream traffic MUST go through a `Transport` from this module.
///
/// This layer is pure I/O: one call in, one raw outcome out. Retry, backoff and
/// fallback decisions live in `extraction::orchestrator`.
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod candidates;
pub mod prompts;

use candidates::Candidate;

/// Header carrying the upstream credential. Keeps the key out of URLs and access logs.
const API_KEY_HEADER: &str = "x-goog-api-key";
/// Upper bound on how much of an error body is kept in diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// The upstream credential. Loaded once at startup, never logged.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for empty or whitespace-only keys.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire format (generateContent)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionPayload {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Set only for candidates that accept the structured-output hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    #[serde(default)]
    candidates: Vec<EnvelopeCandidate>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeCandidate {
    content: Option<Content>,
}

/// Extracts the model's answer from a `generateContent` response body.
///
/// Text parts of the first candidate are concatenated. Returns `None` when the
/// body is not a valid envelope or carries no non-blank text (e.g. a safety block).
pub fn answer_text(body: &str) -> Option<String> {
    let envelope: CompletionEnvelope = serde_json::from_str(body).ok()?;
    let content = envelope.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transport
// ────────────────────────────────────────────────────────────────────────────

/// Everything a transport needs for exactly one call.
#[derive(Debug, Clone, Copy)]
pub struct OutboundRequest<'a> {
    pub candidate: &'a Candidate,
    pub credential: &'a Credential,
    pub payload: &'a CompletionPayload,
    pub timeout: Duration,
}

/// Raw result of one transport call. No interpretation beyond "did bytes come back".
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOutcome {
    Response { status: u16, body: String },
    NetworkError { message: String },
    TimedOut { after: Duration },
}

/// One network call per attempt. Implementations must not retry internally.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest<'_>) -> TransportOutcome;
}

/// HTTP transport against a `generateContent`-style endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint_url(&self, candidate: &Candidate) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url,
            candidate.endpoint_family.api_version(),
            candidate.model_name
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest<'_>) -> TransportOutcome {
        let url = self.endpoint_url(request.candidate);
        debug!(candidate = %request.candidate.id, %url, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, request.credential.expose())
            .header("content-type", "application/json")
            .timeout(request.timeout)
            .json(request.payload)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return TransportOutcome::TimedOut {
                    after: request.timeout,
                }
            }
            Err(e) => {
                return TransportOutcome::NetworkError {
                    message: e.to_string(),
                }
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => TransportOutcome::Response { status, body },
            Err(e) if e.is_timeout() => TransportOutcome::TimedOut {
                after: request.timeout,
            },
            Err(e) => TransportOutcome::NetworkError {
                message: format!("failed to read response body: {e}"),
            },
        }
    }
}

/// Shortens an upstream error body for the diagnostic trail.
pub fn truncate_for_diagnostics(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    short.push('…');
    short
}
