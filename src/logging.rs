//! Structured logging setup.
//!
//! `RUST_LOG` wins over the configured level when present.

use crate::config::{LogFormat, LoggingSettings};
use crate::{Error, ErrorContext, Result};
use tracing_subscriber::EnvFilter;

/// Builds the filter from `RUST_LOG`, falling back to `settings.level`.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid log filter: {}", e),
            ErrorContext::new()
                .with_field_path("logging.level")
                .with_details(settings.level.clone())
                .with_source("logging"),
        )
    })
}

/// Installs the global subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, embedding
/// applications); that is not an error.
pub fn init(settings: &LoggingSettings) -> Result<bool> {
    let filter = build_filter(settings)?;
    let installed = match settings.format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .is_ok(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init()
            .is_ok(),
    };
    Ok(installed)
}
