//! Retry policy — what the orchestrator does after a failed attempt.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extraction::classifier::OutcomeCategory;

/// What to do when a candidate answers with a rate-limit status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitPolicy {
    /// Retry the same candidate with backoff until the budget runs out, then advance.
    #[default]
    Retry,
    /// Move to the next candidate immediately.
    Advance,
    /// Stop the whole chain.
    Abort,
}

impl FromStr for RateLimitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" => Ok(Self::Retry),
            "advance" => Ok(Self::Advance),
            "abort" => Ok(Self::Abort),
            other => Err(format!(
                "unknown rate limit policy '{other}' (expected retry, advance or abort)"
            )),
        }
    }
}

/// Exponential backoff with a cap: base, 2×base, 4×base, … ≤ max.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (1-based). Monotonically non-decreasing.
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            max: Duration::from_millis(8000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries per candidate, first try included.
    pub max_tries_per_candidate: u32,
    pub backoff: BackoffPolicy,
    pub rate_limit: RateLimitPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries_per_candidate: 3,
            backoff: BackoffPolicy::default(),
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    RetrySame { delay: Duration },
    Advance,
    Abort,
}

impl RetryPolicy {
    /// `tries` is the number of tries already made on the current candidate.
    pub fn decide(&self, category: OutcomeCategory, tries: u32) -> Decision {
        match category {
            OutcomeCategory::RateLimited => match self.rate_limit {
                RateLimitPolicy::Retry => self.retry_or_advance(tries),
                RateLimitPolicy::Advance => Decision::Advance,
                RateLimitPolicy::Abort => Decision::Abort,
            },
            OutcomeCategory::UpstreamError | OutcomeCategory::NetworkFailure => {
                self.retry_or_advance(tries)
            }
            // Same model, same prompt: the formatting mistake would repeat.
            OutcomeCategory::MalformedResponse | OutcomeCategory::Unavailable => Decision::Advance,
            OutcomeCategory::DeadlineExceeded => Decision::Abort,
            // Not a failure; callers never ask.
            OutcomeCategory::Success => Decision::Advance,
        }
    }

    fn retry_or_advance(&self, tries: u32) -> Decision {
        if tries < self.max_tries_per_candidate {
            Decision::RetrySame {
                delay: self.backoff.delay(tries),
            }
        } else {
            Decision::Advance
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let backoff = BackoffPolicy::default();
        let delays: Vec<_> = (1..=6).map(|n| backoff.delay(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 8000, 8000]);
    }

    #[test]
    fn test_backoff_is_monotonic_for_large_retries() {
        let backoff = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for n in 1..100 {
            let d = backoff.delay(n);
            assert!(d >= previous);
            assert!(d <= backoff.max);
            previous = d;
        }
    }

    #[test]
    fn test_transient_failures_retry_within_budget() {
        let policy = RetryPolicy::default();
        for category in [
            OutcomeCategory::RateLimited,
            OutcomeCategory::UpstreamError,
            OutcomeCategory::NetworkFailure,
        ] {
            assert_eq!(
                policy.decide(category, 1),
                Decision::RetrySame {
                    delay: Duration::from_millis(1000)
                }
            );
            assert_eq!(
                policy.decide(category, 2),
                Decision::RetrySame {
                    delay: Duration::from_millis(2000)
                }
            );
            assert_eq!(policy.decide(category, 3), Decision::Advance);
        }
    }

    #[test]
    fn test_unavailable_and_malformed_advance_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(OutcomeCategory::Unavailable, 1), Decision::Advance);
        assert_eq!(
            policy.decide(OutcomeCategory::MalformedResponse, 1),
            Decision::Advance
        );
    }

    #[test]
    fn test_rate_limit_policy_variants() {
        let advance = RetryPolicy {
            rate_limit: RateLimitPolicy::Advance,
            ..RetryPolicy::default()
        };
        assert_eq!(advance.decide(OutcomeCategory::RateLimited, 1), Decision::Advance);

        let abort = RetryPolicy {
            rate_limit: RateLimitPolicy::Abort,
            ..RetryPolicy::default()
        };
        assert_eq!(abort.decide(OutcomeCategory::RateLimited, 1), Decision::Abort);
        // Other transient failures are unaffected.
        assert!(matches!(
            abort.decide(OutcomeCategory::UpstreamError, 1),
            Decision::RetrySame { .. }
        ));
    }

    #[test]
    fn test_rate_limit_policy_from_str() {
        assert_eq!("Retry".parse::<RateLimitPolicy>(), Ok(RateLimitPolicy::Retry));
        assert_eq!(" advance ".parse::<RateLimitPolicy>(), Ok(RateLimitPolicy::Advance));
        assert_eq!("abort".parse::<RateLimitPolicy>(), Ok(RateLimitPolicy::Abort));
        assert!("skip".parse::<RateLimitPolicy>().is_err());
    }
}
