//! # Configuration
//!
//! [`Settings`] groups every tunable of the query path into sections
//! (`llm`, `cache`, `retry`, `circuit_breaker`, ...). All fields have
//! defaults, so a settings file only needs the keys it changes.
//!
//! Precedence, lowest first: built-in defaults, YAML file, `AGENTIC_RAG_*`
//! environment variables. [`Settings::load`] validates the merged result.
//!
//! ```rust
//! use agentic_rag::config::Settings;
//!
//! let settings = Settings::from_yaml_str("cache:\n  max_size: 50\n").unwrap();
//! settings.validate().unwrap();
//! assert_eq!(settings.cache.max_size, 50);
//! ```

mod loader;
mod settings;

pub use loader::{CONFIG_PATH_ENV, ENV_PREFIX};
pub use settings::{
    AgentSettings, CacheSettings, ChunkingSettings, CircuitBreakerSettings, EmbeddingSettings,
    Environment, LlmSettings, LogFormat, LoggingSettings, RetrievalSettings, RetrySettings,
    SecuritySettings, Settings, VectorStoreSettings,
};
