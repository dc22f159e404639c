use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation, calls pass through.
    Closed,
    /// Dependency is failing, calls fail fast.
    Open,
    /// Probing whether the dependency recovered.
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
    pub call_timeout: Duration,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    half_open_successes: u32,
    last_failure: Option<Instant>,
}

/// Stops calling a persistently failing dependency.
///
/// One instance per logical dependency, not per call. The mutex guards a
/// read-modify-write only; it is never held across the wrapped call.
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                last_failure: None,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).state
    }

    /// Run one operation through the breaker, bounded by the call timeout.
    /// A timeout counts as a failure.
    pub async fn call<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.precheck()?;

        let outcome = match tokio::time::timeout(self.settings.call_timeout, operation).await {
            Ok(Ok(value)) => {
                self.record_success();
                return Ok(value);
            }
            Ok(Err(err)) => err,
            Err(_) => Error::Transient(format!(
                "call timed out after {}s",
                self.settings.call_timeout.as_secs()
            )),
        };

        self.record_failure();
        Err(outcome)
    }

    /// Fail fast while open; flip to half-open once the recovery timeout
    /// has elapsed since the last failure.
    fn precheck(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let recovered = inner
                    .last_failure
                    .is_some_and(|t| t.elapsed() >= self.settings.recovery_timeout);
                if recovered {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    info!("circuit breaker half-open, probing dependency");
                    Ok(())
                } else {
                    Err(Error::UpstreamUnavailable)
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.settings.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    info!("circuit breaker closed, dependency recovered");
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.consecutive_failures += 1;
        inner.last_failure = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    inner.state = BreakerState::Open;
                    warn!(
                        "circuit breaker opened after {} consecutive failures",
                        inner.consecutive_failures
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                warn!("circuit breaker reopened, dependency still failing");
            }
            BreakerState::Open => {}
        }
    }
}
