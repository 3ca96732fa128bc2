//! Process-wide limiter in front of the upstream credential's quota.
//!
//! Every attempt from every concurrent request takes one token from a shared
//! bucket and one in-flight permit. Waiters queue FIFO on a fair mutex, so a
//! caller retrying in a loop cannot jump ahead of another caller's first attempt.
//! Permits are held for the transport call only, never across backoff sleeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{AcquireError, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn wait_for_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_sec)
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    in_flight: Arc<Semaphore>,
}

/// Held while one upstream call is in flight.
#[derive(Debug)]
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    /// `requests_per_minute` doubles as the burst capacity.
    pub fn new(requests_per_minute: u32, max_in_flight: usize) -> Self {
        let capacity = f64::from(requests_per_minute.max(1));
        Self {
            bucket: Mutex::new(TokenBucket {
                tokens: capacity,
                capacity,
                refill_per_sec: capacity / 60.0,
                last_refill: Instant::now(),
            }),
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// The in-flight slot is taken first and the token last, so a caller
    /// cancelled while waiting never consumes a token.
    pub async fn acquire(&self) -> Result<RatePermit, AcquireError> {
        let permit = self.in_flight.clone().acquire_owned().await?;
        {
            let mut bucket = self.bucket.lock().await;
            bucket.refill(Instant::now());
            let wait = bucket.wait_for_token();
            if !wait.is_zero() {
                debug!(wait_ms = wait.as_millis() as u64, "Upstream rate limiter throttling");
                tokio::time::sleep(wait).await;
                bucket.refill(Instant::now());
            }
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
        }
        Ok(RatePermit { _permit: permit })
    }

    #[cfg(test)]
    pub fn available_in_flight(&self) -> usize {
        self.in_flight.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_up_to_capacity_without_waiting() {
        let limiter = RateLimiter::new(3, 10);
        let start = Instant::now();
        for _ in 0..3 {
            drop(limiter.acquire().await.unwrap());
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_refill_when_bucket_empty() {
        // 60 per minute → one token per second.
        let limiter = RateLimiter::new(60, 10);
        for _ in 0..60 {
            drop(limiter.acquire().await.unwrap());
        }
        let start = Instant::now();
        drop(limiter.acquire().await.unwrap());
        assert!(start.elapsed() >= Duration::from_millis(999));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_permit_released_on_drop() {
        let limiter = RateLimiter::new(100, 1);
        let permit = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available_in_flight(), 0);
        drop(permit);
        assert_eq!(limiter.available_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_does_not_consume_a_token() {
        // Two tokens, one in-flight slot.
        let limiter = RateLimiter::new(2, 1);
        let held = limiter.acquire().await.unwrap();

        let waited = tokio::time::timeout(Duration::from_secs(1), limiter.acquire()).await;
        assert!(waited.is_err());
        drop(held);

        // The second token is still there: no refill wait.
        let start = Instant::now();
        drop(limiter.acquire().await.unwrap());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_served_in_arrival_order() {
        let limiter = Arc::new(RateLimiter::new(1, 10));
        drop(limiter.acquire().await.unwrap());

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for id in 0..3 {
            let limiter = limiter.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                order.lock().await.push(id);
            }));
            // Let each task reach the mutex before spawning the next.
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2]);
    }
}
