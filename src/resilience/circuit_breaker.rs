use crate::{Error, Result};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    pub consecutive_failures: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
    pub times_opened: u64,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug)]
struct State {
    consecutive_failures: u32,
    open_until: Option<Instant>,
    /// When the outstanding half-open trial was admitted.
    trial_started: Option<Instant>,
    times_opened: u64,
}

/// Upper bound for deadlines; larger cooldowns saturate here.
const MAX_DEADLINE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

fn deadline(now: Instant, after: Duration) -> Instant {
    now.checked_add(after)
        .or_else(|| now.checked_add(MAX_DEADLINE))
        .unwrap_or(now)
}

/// Consecutive-failure circuit breaker shared across calls.
///
/// - Closed: calls pass; failures are counted, successes reset the count
/// - Open: calls fail with `CircuitOpen` until the cooldown elapses
/// - Half-open: exactly one trial call is admitted; its success closes the
///   breaker, its failure reopens it with a fresh cooldown. A trial that
///   never reports back is abandoned after one cooldown and another admitted
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                consecutive_failures: 0,
                open_until: None,
                trial_started: None,
                times_opened: 0,
            }),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_of(st: &State, now: Instant) -> CircuitState {
        match st.open_until {
            Some(until) if now < until => CircuitState::Open,
            Some(_) => CircuitState::HalfOpen,
            None => CircuitState::Closed,
        }
    }

    /// Admits a call or fails fast with `CircuitOpen`.
    ///
    /// Every admitted call must be followed by `on_success`, `on_failure`
    /// or `release`.
    pub fn allow(&self) -> Result<()> {
        let mut st = self.lock();
        let now = Instant::now();
        match Self::state_of(&st, now) {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let remaining = st
                    .open_until
                    .map(|until| until.saturating_duration_since(now))
                    .unwrap_or_default();
                Err(Error::CircuitOpen {
                    remaining_ms: remaining.as_millis() as u64,
                })
            }
            CircuitState::HalfOpen => {
                if let Some(started) = st.trial_started {
                    let elapsed = now.saturating_duration_since(started);
                    if elapsed < self.cfg.cooldown {
                        return Err(Error::CircuitOpen {
                            remaining_ms: (self.cfg.cooldown - elapsed).as_millis() as u64,
                        });
                    }
                    warn!("half-open trial never reported back; admitting another");
                }
                st.trial_started = Some(now);
                info!("circuit breaker half-open; admitting trial call");
                Ok(())
            }
        }
    }

    pub fn on_success(&self) {
        let mut st = self.lock();
        if st.open_until.is_some() {
            info!("circuit breaker closed after successful trial");
        }
        st.consecutive_failures = 0;
        st.open_until = None;
        st.trial_started = None;
    }

    pub fn on_failure(&self) {
        let mut st = self.lock();
        let now = Instant::now();
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
        let reopen = st.trial_started.take().is_some();
        if reopen || st.consecutive_failures >= self.cfg.failure_threshold {
            if Self::state_of(&st, now) != CircuitState::Open {
                st.times_opened = st.times_opened.saturating_add(1);
                error!(
                    consecutive_failures = st.consecutive_failures,
                    cooldown_ms = self.cfg.cooldown.as_millis() as u64,
                    "circuit breaker opened"
                );
            }
            st.open_until = Some(deadline(now, self.cfg.cooldown));
        }
    }

    /// For an admitted call that ended without an outcome (its future was
    /// dropped or it panicked). A pending half-open trial counts as failed
    /// and the breaker reopens; in the closed state nothing is recorded.
    pub fn release(&self) {
        let mut st = self.lock();
        if st.trial_started.take().is_some() {
            st.times_opened = st.times_opened.saturating_add(1);
            st.open_until = Some(deadline(Instant::now(), self.cfg.cooldown));
            warn!("half-open trial abandoned; circuit breaker reopened");
        }
    }

    pub fn state(&self) -> CircuitState {
        Self::state_of(&self.lock(), Instant::now())
    }

    /// Forces the breaker closed and clears counters.
    pub fn reset(&self) {
        let mut st = self.lock();
        st.consecutive_failures = 0;
        st.open_until = None;
        st.trial_started = None;
        info!("circuit breaker manually reset");
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        let st = self.lock();
        let open_remaining_ms = st.open_until.and_then(|until| {
            if until > now {
                Some((until - now).as_millis() as u64)
            } else {
                None
            }
        });
        CircuitBreakerSnapshot {
            state: Self::state_of(&st, now),
            failure_threshold: self.cfg.failure_threshold,
            cooldown_ms: self.cfg.cooldown.as_millis() as u64,
            consecutive_failures: st.consecutive_failures,
            open_remaining_ms,
            times_opened: st.times_opened,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_kind::ErrorKind;
    use std::thread;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_failure_threshold(threshold)
                .with_cooldown(Duration::from_millis(cooldown_ms)),
        )
    }

    #[test]
    fn test_circuit_breaker_config_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_circuit_breaker_initial_state() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert!(cb.allow().is_ok());
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(snapshot.open_remaining_ms.is_none());
    }

    #[test]
    fn test_circuit_breaker_success_resets_failures() {
        let cb = breaker(5, 1000);
        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.snapshot().consecutive_failures, 2);
        cb.on_success();
        assert_eq!(cb.snapshot().consecutive_failures, 0);
    }

    #[test]
    fn test_circuit_breaker_opens_at_threshold() {
        let cb = breaker(3, 1000);
        cb.on_failure();
        cb.on_failure();
        assert!(cb.allow().is_ok());

        cb.on_failure();
        let err = cb.allow().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.snapshot().open_remaining_ms.is_some());
        assert_eq!(cb.snapshot().times_opened, 1);
    }

    #[test]
    fn test_half_open_admits_single_trial() {
        let cb = breaker(2, 50);
        cb.on_failure();
        cb.on_failure();
        assert!(cb.allow().is_err());

        thread::sleep(Duration::from_millis(60));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allow().is_ok());
        // second caller is refused while the trial is outstanding
        assert!(cb.allow().is_err());

        cb.on_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow().is_ok());
    }

    #[test]
    fn test_failed_trial_reopens_with_fresh_cooldown() {
        let cb = breaker(2, 50);
        cb.on_failure();
        cb.on_failure();
        thread::sleep(Duration::from_millis(60));
        assert!(cb.allow().is_ok());

        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        let remaining = cb.snapshot().open_remaining_ms.unwrap();
        assert!(remaining > 20, "cooldown should restart, got {remaining}ms");
        assert_eq!(cb.snapshot().times_opened, 2);
    }

    #[test]
    fn test_stale_trial_is_replaced_after_cooldown() {
        let cb = breaker(1, 40);
        cb.on_failure();
        thread::sleep(Duration::from_millis(50));
        assert!(cb.allow().is_ok());
        // the trial never reports back
        assert!(cb.allow().is_err());
        thread::sleep(Duration::from_millis(50));
        assert!(cb.allow().is_ok());
        cb.on_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_release_reopens_pending_trial() {
        let cb = breaker(1, 40);
        cb.on_failure();
        thread::sleep(Duration::from_millis(50));
        assert!(cb.allow().is_ok());
        cb.release();
        assert_eq!(cb.state(), CircuitState::Open);

        // release outside a trial records nothing
        cb.reset();
        cb.release();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 0);
    }

    #[test]
    fn test_huge_cooldown_saturates() {
        let cb = CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_failure_threshold(1)
                .with_cooldown(Duration::MAX),
        );
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.allow().unwrap_err().kind(), ErrorKind::CircuitOpen);
    }

    #[test]
    fn test_reset_closes() {
        let cb = breaker(1, 10_000);
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow().is_ok());
    }

    #[test]
    fn test_circuit_breaker_thread_safe() {
        use std::sync::Arc;

        let cb = Arc::new(breaker(100, 1000));
        let mut handles = vec![];
        for _ in 0..10 {
            let cb_clone = Arc::clone(&cb);
            handles.push(thread::spawn(move || {
                for _ in 0..5 {
                    cb_clone.on_failure();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cb.snapshot().consecutive_failures, 50);
    }
}
