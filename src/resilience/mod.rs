//! # Resilience Primitives
//!
//! Retry with exponential backoff and a consecutive-failure circuit breaker
//! for calls into the external agent/LLM layer.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`retry`] | [`RetryPolicy`] strategy object driven by [`RetryConfig`] |
//! | [`circuit_breaker`] | Closed / open / half-open breaker shared across calls |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: calls pass through, failures are counted
//! - **Open**: threshold reached, calls fail fast with `CircuitOpen`
//! - **Half-Open**: cooldown elapsed, one trial call decides
//!
//! ```rust
//! use agentic_rag::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryPolicy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let breaker = Arc::new(CircuitBreaker::new(
//!     CircuitBreakerConfig::new()
//!         .with_failure_threshold(3)
//!         .with_cooldown(Duration::from_secs(1)),
//! ));
//! let policy = RetryPolicy::new(RetryConfig::new().with_max_retries(2))
//!     .with_circuit_breaker(breaker);
//! # let _ = policy;
//! ```

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
pub use retry::{Decision, RetryConfig, RetryPolicy};
