//! Fallback Orchestrator — walks the candidate registry as an explicit state machine.
//!
//! ```text
//! Selecting ──candidate left──▶ Attempting ──always──▶ Evaluating ──ok──▶ Succeeded
//!     │  ▲                          ▲                      │
//!     │  └──────── advance ─────────┼──────────────────────┤
//!     │                             └── retry (backoff) ───┘
//!     └──none left / abort / deadline──▶ Exhausted
//! ```
//!
//! One call is one sequential run: candidates usually share a credential and a
//! quota, so trying them in parallel only makes throttling worse.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::extraction::classifier::{classify, Classification, OutcomeCategory};
use crate::extraction::diagnostics::{Attempt, ExtractionResult, TerminalFailure};
use crate::extraction::policy::{Decision, RetryPolicy};
use crate::extraction::prompt_builder::{build_payload, Prompt};
use crate::extraction::rate_limit::RateLimiter;
use crate::llm_client::candidates::{Candidate, CandidateRegistry};
use crate::llm_client::{Credential, OutboundRequest, Transport, TransportOutcome};

enum ChainState<T> {
    Selecting {
        next: usize,
    },
    Attempting {
        index: usize,
        tries: u32,
    },
    Evaluating {
        index: usize,
        tries: u32,
        started_at: DateTime<Utc>,
        outcome: TransportOutcome,
    },
    Succeeded(T),
    Exhausted(TerminalFailure),
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<CandidateRegistry>,
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<CandidateRegistry>,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            limiter,
            policy,
            attempt_timeout,
        }
    }

    /// Runs the fallback chain until one answer passes `evaluate`, the registry
    /// is exhausted, or `deadline` passes.
    ///
    /// Per-attempt failures are recorded, never returned as errors. Data is only
    /// returned from an attempt classified `Success` whose answer evaluated cleanly.
    pub async fn run<T, E, F>(
        &self,
        prompt: &Prompt,
        credential: &Credential,
        deadline: Instant,
        evaluate: F,
    ) -> ExtractionResult<T>
    where
        F: Fn(&str) -> Result<T, E>,
        E: Display,
    {
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut state = ChainState::Selecting { next: 0 };

        loop {
            state = match state {
                ChainState::Selecting { next } => {
                    if next < self.registry.len() {
                        ChainState::Attempting {
                            index: next,
                            tries: 1,
                        }
                    } else {
                        ChainState::Exhausted(TerminalFailure::AllCandidatesExhausted)
                    }
                }

                ChainState::Attempting { index, tries } => {
                    let Some(candidate) = self.registry.get(index) else {
                        return ExtractionResult::failed(
                            TerminalFailure::AllCandidatesExhausted,
                            attempts,
                        );
                    };
                    match self.attempt(candidate, prompt, credential, deadline).await {
                        Some((started_at, outcome)) => ChainState::Evaluating {
                            index,
                            tries,
                            started_at,
                            outcome,
                        },
                        None => {
                            attempts.push(deadline_attempt(candidate));
                            ChainState::Exhausted(TerminalFailure::DeadlineExceeded)
                        }
                    }
                }

                ChainState::Evaluating {
                    index,
                    tries,
                    started_at,
                    outcome,
                } => {
                    let Some(candidate) = self.registry.get(index) else {
                        return ExtractionResult::failed(
                            TerminalFailure::AllCandidatesExhausted,
                            attempts,
                        );
                    };

                    let evaluated = match classify(&outcome) {
                        Classification::Success { status, answer } => match evaluate(&answer) {
                            Ok(data) => Ok((status, data)),
                            Err(e) => Err((
                                OutcomeCategory::MalformedResponse,
                                Some(status),
                                Some(e.to_string()),
                            )),
                        },
                        Classification::Failure {
                            category,
                            http_status,
                            message,
                        } => Err((category, http_status, message)),
                    };

                    match evaluated {
                        Ok((status, data)) => {
                            info!(candidate = %candidate.id, tries, "Candidate succeeded");
                            attempts.push(Attempt {
                                candidate_id: candidate.id.clone(),
                                started_at,
                                outcome_category: OutcomeCategory::Success,
                                http_status: Some(status),
                                raw_error_text: None,
                            });
                            ChainState::Succeeded(data)
                        }
                        Err((category, http_status, message)) => {
                            warn!(
                                candidate = %candidate.id,
                                category = %category,
                                status = ?http_status,
                                tries,
                                "Candidate attempt failed"
                            );
                            attempts.push(Attempt {
                                candidate_id: candidate.id.clone(),
                                started_at,
                                outcome_category: category,
                                http_status,
                                raw_error_text: message,
                            });
                            self.after_failure(
                                candidate,
                                index,
                                tries,
                                category,
                                deadline,
                                &mut attempts,
                            )
                            .await
                        }
                    }
                }

                ChainState::Succeeded(data) => {
                    return ExtractionResult::succeeded(data, attempts);
                }

                ChainState::Exhausted(terminal) => {
                    warn!(?terminal, attempts = attempts.len(), "Fallback chain exhausted");
                    return ExtractionResult::failed(terminal, attempts);
                }
            };
        }
    }

    /// Evaluating → Attempting (same candidate), Selecting (next) or Exhausted.
    async fn after_failure<T>(
        &self,
        candidate: &Candidate,
        index: usize,
        tries: u32,
        category: OutcomeCategory,
        deadline: Instant,
        attempts: &mut Vec<Attempt>,
    ) -> ChainState<T> {
        match self.policy.decide(category, tries) {
            Decision::RetrySame { delay } => {
                if Instant::now() + delay >= deadline {
                    attempts.push(deadline_attempt(candidate));
                    return ChainState::Exhausted(TerminalFailure::DeadlineExceeded);
                }
                info!(
                    candidate = %candidate.id,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retrying candidate"
                );
                tokio::time::sleep(delay).await;
                ChainState::Attempting {
                    index,
                    tries: tries + 1,
                }
            }
            Decision::Advance => ChainState::Selecting { next: index + 1 },
            Decision::Abort => {
                warn!(candidate = %candidate.id, category = %category, "Aborting fallback chain");
                ChainState::Exhausted(TerminalFailure::Aborted)
            }
        }
    }

    /// One bounded transport call. `None` when the deadline passes first.
    async fn attempt(
        &self,
        candidate: &Candidate,
        prompt: &Prompt,
        credential: &Credential,
        deadline: Instant,
    ) -> Option<(DateTime<Utc>, TransportOutcome)> {
        if Instant::now() >= deadline {
            return None;
        }

        let permit = match tokio::time::timeout_at(deadline, self.limiter.acquire()).await {
            Err(_) => return None,
            Ok(Ok(permit)) => permit,
            Ok(Err(e)) => {
                return Some((
                    Utc::now(),
                    TransportOutcome::NetworkError {
                        message: format!("rate limiter unavailable: {e}"),
                    },
                ))
            }
        };

        let timeout = deadline
            .saturating_duration_since(Instant::now())
            .min(self.attempt_timeout);
        let payload = build_payload(prompt, candidate);
        let started_at = Utc::now();

        let request = OutboundRequest {
            candidate,
            credential,
            payload: &payload,
            timeout,
        };
        let outcome = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(outcome) => outcome,
            Err(_) => TransportOutcome::TimedOut { after: timeout },
        };
        drop(permit);

        Some((started_at, outcome))
    }
}

fn deadline_attempt(candidate: &Candidate) -> Attempt {
    Attempt {
        candidate_id: candidate.id.clone(),
        started_at: Utc::now(),
        outcome_category: OutcomeCategory::DeadlineExceeded,
        http_status: None,
        raw_error_text: Some("overall deadline reached before the attempt could run".to_string()),
    }
}
