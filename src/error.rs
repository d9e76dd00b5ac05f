use crate::error_kind::ErrorKind;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or settings key that caused the error (e.g., "cache.ttl_secs")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Component that raised the error (e.g., "result_cache", "settings")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the query path.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {message}{}", format_context(.context))]
    InvalidArgument {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Not found: {message}{}", format_context(.context))]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// Failure reported by the wrapped upstream operation (agent, LLM, embedder).
    #[error("Upstream error ({kind}): {message}")]
    Upstream { kind: ErrorKind, message: String },

    #[error("Circuit breaker open; retry in {remaining_ms} ms")]
    CircuitOpen { remaining_ms: u64 },

    #[error("Gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidArgument {
            message: msg.into(),
            context,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation {
            message: msg.into(),
            context: ErrorContext::new().with_source("query_validator"),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn not_found(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::NotFound {
            message: msg.into(),
            context,
        }
    }

    /// A failure of the wrapped operation with a declared kind.
    pub fn upstream(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Error::Upstream {
            kind,
            message: msg.into(),
        }
    }

    /// Transient upstream failure, eligible for backoff.
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::upstream(ErrorKind::Retryable, msg)
    }

    /// Permanent upstream failure, propagated immediately.
    pub fn non_retryable(msg: impl Into<String>) -> Self {
        Self::upstream(ErrorKind::NonRetryable, msg)
    }

    /// The classification the retry policy acts on.
    ///
    /// `RetriesExhausted` reports the kind of the last failure it wraps.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Upstream { kind, .. } => *kind,
            Error::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Error::RetriesExhausted { source, .. } => source.kind(),
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) | Error::Yaml(_) => ErrorKind::Serialization,
        }
    }

    /// Number of attempts made, when the error came out of a retry loop.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidArgument { context, .. }
            | Error::Validation { context, .. }
            | Error::Configuration { context, .. }
            | Error::NotFound { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Summary safe to show an end user: kind and attempt count, no payload.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message, .. } => format!("Invalid query: {}", message),
            Error::CircuitOpen { remaining_ms } => format!(
                "The answering service is temporarily unavailable; try again in {}s",
                remaining_ms.div_ceil(1000)
            ),
            _ => match self.attempts() {
                Some(n) => format!(
                    "Query failed after {} attempt(s) (last error: {}, code {})",
                    n,
                    self.kind(),
                    self.kind().code()
                ),
                None => format!(
                    "Query failed (error: {}, code {})",
                    self.kind(),
                    self.kind().code()
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_reports_inner_kind() {
        let err = Error::RetriesExhausted {
            attempts: 4,
            source: Box::new(Error::upstream(ErrorKind::Timeout, "llm timed out")),
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.attempts(), Some(4));
        assert!(err.to_string().contains("4 attempt(s)"));
    }

    #[test]
    fn context_is_rendered() {
        let err = Error::invalid_argument(
            "ttl must be positive",
            ErrorContext::new()
                .with_field_path("ttl")
                .with_source("result_cache"),
        );
        assert_eq!(
            err.to_string(),
            "Invalid argument: ttl must be positive (field: ttl, source: result_cache)"
        );
        assert_eq!(err.context().unwrap().field_path.as_deref(), Some("ttl"));
    }

    #[test]
    fn user_message_hides_payload() {
        let err = Error::RetriesExhausted {
            attempts: 3,
            source: Box::new(Error::retryable("secret upstream body: api_key=abc")),
        };
        let msg = err.user_message();
        assert!(msg.contains("3 attempt(s)"));
        assert!(msg.contains("retryable"));
        assert!(!msg.contains("api_key"));
    }

    #[test]
    fn circuit_open_message_rounds_up() {
        let err = Error::CircuitOpen { remaining_ms: 1500 };
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
        assert!(err.user_message().contains("2s"));
    }
}
