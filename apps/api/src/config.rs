use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::extraction::policy::{BackoffPolicy, RateLimitPolicy, RetryPolicy};
use crate::llm_client::candidates::{default_candidates, Candidate, CandidateRegistry};
use crate::llm_client::Credential;

const DEFAULT_UPSTREAM_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Application configuration loaded from environment variables.
///
/// A missing API key is not a startup failure: every call then fails with a
/// configuration error before any upstream attempt.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<Credential>,
    pub upstream_base_url: String,
    pub candidates: Vec<Candidate>,
    pub retry_policy: RetryPolicy,
    pub attempt_timeout: Duration,
    pub deadline: Duration,
    pub max_in_flight: usize,
    pub requests_per_minute: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("GOOGLE_API_KEY")
            .or_else(|| lookup("VITE_GOOGLE_API_KEY"))
            .and_then(Credential::new);

        let candidates = match lookup("EXTRACT_CANDIDATES") {
            Some(raw) => serde_json::from_str::<Vec<Candidate>>(&raw)
                .context("EXTRACT_CANDIDATES must be a JSON array of candidates")?,
            None => default_candidates(),
        };
        // Fail at startup rather than on the first request.
        CandidateRegistry::new(candidates.clone()).context("invalid candidate registry")?;

        let backoff = BackoffPolicy {
            base: Duration::from_millis(parse_or(&lookup, "EXTRACT_BACKOFF_BASE_MS", 1000)?),
            max: Duration::from_millis(parse_or(&lookup, "EXTRACT_BACKOFF_MAX_MS", 8000)?),
        };
        if backoff.max < backoff.base {
            bail!("EXTRACT_BACKOFF_MAX_MS must be >= EXTRACT_BACKOFF_BASE_MS");
        }

        let max_tries_per_candidate: u32 = parse_or(&lookup, "EXTRACT_MAX_TRIES", 3)?;
        if max_tries_per_candidate == 0 {
            bail!("EXTRACT_MAX_TRIES must be at least 1");
        }

        let attempt_timeout_secs: u64 = parse_or(&lookup, "EXTRACT_ATTEMPT_TIMEOUT_SECS", 30)?;
        if attempt_timeout_secs == 0 {
            bail!("EXTRACT_ATTEMPT_TIMEOUT_SECS must be at least 1");
        }
        let deadline_secs: u64 = parse_or(&lookup, "EXTRACT_DEADLINE_SECS", 90)?;
        if deadline_secs == 0 {
            bail!("EXTRACT_DEADLINE_SECS must be at least 1");
        }

        let rate_limit = match lookup("EXTRACT_RATE_LIMIT_POLICY") {
            Some(raw) => raw
                .parse::<RateLimitPolicy>()
                .map_err(anyhow::Error::msg)
                .context("EXTRACT_RATE_LIMIT_POLICY is invalid")?,
            None => RateLimitPolicy::default(),
        };

        Ok(Config {
            api_key,
            upstream_base_url: lookup("UPSTREAM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string()),
            candidates,
            retry_policy: RetryPolicy {
                max_tries_per_candidate,
                backoff,
                rate_limit,
            },
            attempt_timeout: Duration::from_secs(attempt_timeout_secs),
            deadline: Duration::from_secs(deadline_secs),
            max_in_flight: parse_or(&lookup, "UPSTREAM_MAX_IN_FLIGHT", 4)?,
            requests_per_minute: parse_or(&lookup, "UPSTREAM_REQUESTS_PER_MINUTE", 30)?,
            port: parse_or(&lookup, "PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Logs the settings that change runtime behavior. Never logs the key itself.
    pub fn log_summary(&self) {
        if self.api_key.is_none() {
            warn!("GOOGLE_API_KEY is not set; extraction calls will fail with a configuration error");
        }
        tracing::info!(
            candidates = self.candidates.len(),
            max_tries = self.retry_policy.max_tries_per_candidate,
            rate_limit_policy = ?self.retry_policy.rate_limit,
            attempt_timeout_s = self.attempt_timeout.as_secs(),
            deadline_s = self.deadline.as_secs(),
            "Extraction settings loaded"
        );
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
