//! Error classification used by the retry and circuit-breaker layer.
//!
//! Every [`crate::Error`] maps to exactly one [`ErrorKind`]. The retry policy
//! decides retryability from the kind alone and never looks at the payload.
//!
//! ## Kind Codes
//!
//! | Prefix | Category    | Description                              |
//! |--------|-------------|------------------------------------------|
//! | Q1xxx  | client      | Bad input or bad configuration           |
//! | Q2xxx  | rate        | Upstream throttling                      |
//! | Q3xxx  | upstream    | Failures of the wrapped operation        |
//! | Q4xxx  | operational | Local guards (circuit breaker)           |
//! | Q9xxx  | internal    | I/O and serialization                    |
//!
//! ## Example
//!
//! ```rust
//! use agentic_rag::error_kind::ErrorKind;
//!
//! let kind = ErrorKind::from_name("rate_limited").unwrap();
//! assert_eq!(kind.code(), "Q2001");
//! assert!(kind.retryable());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Q1001: Invalid argument such as a zero ttl or zero capacity
    InvalidArgument,
    /// Q1002: User input rejected by validation
    Validation,
    /// Q1003: Invalid or incomplete settings
    Configuration,
    /// Q1004: Requested index, document or entry does not exist
    NotFound,
    /// Q2001: Upstream rate limit exceeded
    RateLimited,
    /// Q3001: Upstream call timed out
    Timeout,
    /// Q3002: Transient upstream failure
    Retryable,
    /// Q3003: Permanent upstream failure
    NonRetryable,
    /// Q4001: Circuit breaker is open
    CircuitOpen,
    /// Q9001: Local I/O failure
    Io,
    /// Q9002: Encoding or decoding failure
    Serialization,
}

impl ErrorKind {
    /// All kinds, in code order.
    pub const ALL: [ErrorKind; 11] = [
        Self::InvalidArgument,
        Self::Validation,
        Self::Configuration,
        Self::NotFound,
        Self::RateLimited,
        Self::Timeout,
        Self::Retryable,
        Self::NonRetryable,
        Self::CircuitOpen,
        Self::Io,
        Self::Serialization,
    ];

    /// Returns the stable code string (e.g., `"Q1001"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "Q1001",
            Self::Validation => "Q1002",
            Self::Configuration => "Q1003",
            Self::NotFound => "Q1004",
            Self::RateLimited => "Q2001",
            Self::Timeout => "Q3001",
            Self::Retryable => "Q3002",
            Self::NonRetryable => "Q3003",
            Self::CircuitOpen => "Q4001",
            Self::Io => "Q9001",
            Self::Serialization => "Q9002",
        }
    }

    /// Returns the snake_case name (e.g., `"invalid_argument"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Validation => "validation",
            Self::Configuration => "configuration",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Retryable => "retryable",
            Self::NonRetryable => "non_retryable",
            Self::CircuitOpen => "circuit_open",
            Self::Io => "io",
            Self::Serialization => "serialization",
        }
    }

    /// Whether this kind is retried when no explicit kind set is configured.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Retryable)
    }

    /// Returns the category: `"client"`, `"rate"`, `"upstream"`, `"operational"` or `"internal"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument | Self::Validation | Self::Configuration | Self::NotFound => {
                "client"
            }
            Self::RateLimited => "rate",
            Self::Timeout | Self::Retryable | Self::NonRetryable => "upstream",
            Self::CircuitOpen => "operational",
            Self::Io | Self::Serialization => "internal",
        }
    }

    /// Parses a kind from its name. Accepts a few aliases used in settings files.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "invalid_argument" => Self::InvalidArgument,
            "validation" | "input_validation" => Self::Validation,
            "configuration" | "config" => Self::Configuration,
            "not_found" => Self::NotFound,
            "rate_limited" | "rate_limit" => Self::RateLimited,
            "timeout" => Self::Timeout,
            "retryable" | "transient" => Self::Retryable,
            "non_retryable" | "permanent" => Self::NonRetryable,
            "circuit_open" => Self::CircuitOpen,
            "io" => Self::Io,
            "serialization" => Self::Serialization,
            _ => return None,
        };
        Some(kind)
    }

    /// Kinds that are retried by default.
    pub fn default_retryable() -> Vec<ErrorKind> {
        Self::ALL.iter().copied().filter(|k| k.retryable()).collect()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
