use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::extraction::extractor::Extractor;
use crate::extraction::orchestrator::Orchestrator;
use crate::extraction::rate_limit::RateLimiter;
use crate::llm_client::candidates::CandidateRegistry;
use crate::llm_client::{HttpTransport, Transport};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Holds the read-only candidate registry and the process-wide rate limiter.
    pub extractor: Extractor,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(config.upstream_base_url.clone())
            .context("Failed to build HTTP client")?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let registry = CandidateRegistry::new(config.candidates.clone())
            .context("invalid candidate registry")?;
        let limiter = RateLimiter::new(config.requests_per_minute, config.max_in_flight);
        let orchestrator = Orchestrator::new(
            Arc::new(registry),
            transport,
            Arc::new(limiter),
            config.retry_policy,
            config.attempt_timeout,
        );
        Ok(Self {
            extractor: Extractor::new(orchestrator, config.api_key.clone(), config.deadline),
        })
    }
}
