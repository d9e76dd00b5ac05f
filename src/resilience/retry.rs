//! Retry with exponential backoff.
//!
//! [`RetryPolicy::execute`] wraps an async operation. Retryability is decided
//! from [`ErrorKind`] alone; the delay before retry `n` (0-based) is
//! `min(base_delay * 2^n, max_delay)`.

use super::circuit_breaker::CircuitBreaker;
use crate::error_kind::ErrorKind;
use crate::{Error, Result};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Fail,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retryable_kinds: HashSet<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            retryable_kinds: ErrorKind::default_retryable().into_iter().collect(),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backoff tuned for upstream throttling: 5 retries, 2s base, capped at 5 minutes.
    pub fn rate_limit() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            retryable_kinds: HashSet::from([ErrorKind::RateLimited]),
        }
    }

    /// Backoff for slow upstream calls: 3 retries, 1s base, capped at 30s.
    pub fn timeout() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retryable_kinds: HashSet::from([ErrorKind::Timeout]),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_retryable_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable_kinds = kinds.into_iter().collect();
        self
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }

    /// `min(base_delay * 2^attempt, max_delay)`, saturating on overflow.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decide what to do after an attempt failed.
    ///
    /// `attempt` is 0-based (first failure => attempt=0).
    pub fn decide(&self, err: &Error, attempt: u32) -> Decision {
        if self.is_retryable(err.kind()) && attempt < self.max_retries {
            Decision::Retry {
                delay: self.backoff(attempt),
            }
        } else {
            Decision::Fail
        }
    }
}

type RetryHook = Arc<dyn Fn(&Error, u32) + Send + Sync>;

/// Transient per-call bookkeeping.
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    last_kind: Option<ErrorKind>,
}

/// Admission through the breaker for one attempt. An attempt that never
/// settles (dropped future, panic) is released on drop.
struct Permit<'a> {
    breaker: Option<&'a CircuitBreaker>,
}

impl<'a> Permit<'a> {
    fn acquire(breaker: Option<&'a CircuitBreaker>) -> Result<Self> {
        if let Some(cb) = breaker {
            cb.allow()?;
        }
        Ok(Self { breaker })
    }

    fn settle(mut self, ok: bool) {
        if let Some(cb) = self.breaker.take() {
            if ok {
                cb.on_success();
            } else {
                cb.on_failure();
            }
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if let Some(cb) = self.breaker.take() {
            cb.release();
        }
    }
}

/// Retry strategy with an optional shared circuit breaker.
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    breaker: Option<Arc<CircuitBreaker>>,
    on_retry: Option<RetryHook>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            breaker: None,
            on_retry: None,
        }
    }

    /// Routes every attempt through `breaker`; share one breaker across policies
    /// guarding the same dependency.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Called before each backoff sleep with the failure and the 0-based attempt.
    pub fn on_retry(mut self, hook: impl Fn(&Error, u32) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable kind, or
    /// runs out of retries.
    ///
    /// A non-retryable failure on the first attempt is returned as is; any
    /// failure after at least one retry is wrapped in
    /// [`Error::RetriesExhausted`] carrying the number of invocations.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = RetryState::default();
        loop {
            let permit = match Permit::acquire(self.breaker.as_deref()) {
                Ok(permit) => permit,
                Err(open) => return Err(annotate(open, state.attempt)),
            };

            let outcome = operation().await;
            permit.settle(outcome.is_ok());
            match outcome {
                Ok(value) => {
                    if state.attempt > 0 {
                        info!(
                            attempts = state.attempt + 1,
                            last_error = ?state.last_kind,
                            "operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let kind = err.kind();
                    state.last_kind = Some(kind);
                    let invocations = state.attempt + 1;

                    match self.config.decide(&err, state.attempt) {
                        Decision::Retry { delay } => {
                            warn!(
                                attempt = invocations,
                                max_retries = self.config.max_retries,
                                delay_ms = delay.as_millis() as u64,
                                kind = %kind,
                                "retrying after failure"
                            );
                            if let Some(ref hook) = self.on_retry {
                                hook(&err, state.attempt);
                            }
                            tokio::time::sleep(delay).await;
                            state.attempt += 1;
                        }
                        Decision::Fail if !self.config.is_retryable(kind) => {
                            return Err(annotate(err, state.attempt));
                        }
                        Decision::Fail => {
                            error!(
                                attempts = invocations,
                                kind = %kind,
                                "max retries exceeded"
                            );
                            return Err(Error::RetriesExhausted {
                                attempts: invocations,
                                source: Box::new(err),
                            });
                        }
                    }
                }
            }
        }
    }
}

/// Wraps `err` with the attempt count once at least one retry has happened.
fn annotate(err: Error, retries_done: u32) -> Error {
    if retries_done == 0 {
        err
    } else {
        Error::RetriesExhausted {
            attempts: retries_done + 1,
            source: Box::new(err),
        }
    }
}
