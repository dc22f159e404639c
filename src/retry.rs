use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Backoff strategies for spacing retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
    /// Exponential, scaled by a uniform factor in [0.5, 1.0) to avoid
    /// thundering herds.
    ExponentialJitter,
}

impl FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(BackoffStrategy::Fixed),
            "linear" => Ok(BackoffStrategy::Linear),
            "exponential" => Ok(BackoffStrategy::Exponential),
            "exponential-jitter" => Ok(BackoffStrategy::ExponentialJitter),
            other => Err(format!("unknown backoff strategy {other:?}")),
        }
    }
}

/// Re-attempts transient failures with configurable backoff.
///
/// Non-transient failures propagate immediately without consuming further
/// attempts; exhaustion surfaces as [`Error::RetryExhausted`] carrying the
/// attempt count and last cause.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    strategy: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        strategy: BackoffStrategy,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            strategy,
        }
    }

    /// Delay before the retry following `attempt` (1-based), clamped to the
    /// configured maximum.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let raw = match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base * f64::from(attempt),
            BackoffStrategy::Exponential => base * 2f64.powi(attempt as i32 - 1),
            BackoffStrategy::ExponentialJitter => {
                let factor: f64 = rand::thread_rng().gen_range(0.5..1.0);
                base * 2f64.powi(attempt as i32 - 1) * factor
            }
        };
        Duration::from_secs_f64(raw).min(self.max_delay)
    }

    /// Invoke `operation` up to `max_attempts` times.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 1..=self.max_attempts {
            debug!("attempt {attempt}/{}", self.max_attempts);
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    if attempt == self.max_attempts {
                        return Err(Error::RetryExhausted {
                            attempts: self.max_attempts,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.delay_for(attempt);
                    warn!(
                        "attempt {attempt} failed, retrying in {:.2}s: {err}",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
        // max_attempts >= 1, so the loop always returns.
        unreachable!("retry loop exited without a result")
    }
}
