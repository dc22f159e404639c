use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Token bucket state for one dependency.
#[derive(Debug)]
struct RateBudget {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter for upstream requests.
///
/// `acquire` never errors; a caller that finds the bucket empty is paused
/// until a token would have accrued. The lock is held only across the
/// read-modify-write, never across the pause.
pub struct RateLimiter {
    rate_per_minute: f64,
    bucket_size: f64,
    budget: Mutex<RateBudget>,
}

impl RateLimiter {
    /// Bucket size equals the per-minute rate, so a full bucket allows one
    /// minute of burst.
    pub fn new(rate_per_minute: u32) -> Self {
        let rate = f64::from(rate_per_minute);
        Self {
            rate_per_minute: rate,
            bucket_size: rate,
            budget: Mutex::new(RateBudget {
                tokens: rate,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, budget: &mut RateBudget, now: Instant) {
        let elapsed = now.duration_since(budget.last_refill).as_secs_f64();
        budget.tokens =
            (budget.tokens + elapsed * (self.rate_per_minute / 60.0)).min(self.bucket_size);
        budget.last_refill = now;
    }

    /// Take one token, pausing the caller if none is available.
    pub async fn acquire(&self) {
        let wait = {
            let mut budget = self.budget.lock().await;
            let now = Instant::now();
            self.refill(&mut budget, now);

            if budget.tokens < 1.0 {
                let wait_secs = (1.0 - budget.tokens) * (60.0 / self.rate_per_minute);
                budget.tokens = 0.0;
                budget.last_refill = now + Duration::from_secs_f64(wait_secs);
                Some(Duration::from_secs_f64(wait_secs))
            } else {
                budget.tokens -= 1.0;
                None
            }
        };

        if let Some(wait) = wait {
            debug!("rate limit reached, pausing {:.2}s", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available, after refill. Exposed for the stats surface.
    pub async fn available(&self) -> f64 {
        let mut budget = self.budget.lock().await;
        self.refill(&mut budget, Instant::now());
        budget.tokens
    }
}
