//! Settings sections and their defaults.

use crate::agent::AgentMode;
use crate::cache::CacheConfig;
use crate::documents::ChunkerConfig;
use crate::error_kind::ErrorKind;
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::validation::QueryValidator;
use crate::vector_store::SimilarityMetric;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    pub environment: Environment,
    pub docs_dir: PathBuf,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub agent: AgentSettings,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub logging: LoggingSettings,
    pub security: SecuritySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Agentic RAG".to_string(),
            environment: Environment::default(),
            docs_dir: PathBuf::from("."),
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            vector_store: VectorStoreSettings::default(),
            chunking: ChunkingSettings::default(),
            retrieval: RetrievalSettings::default(),
            agent: AgentSettings::default(),
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            logging: LoggingSettings::default(),
            security: SecuritySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub model_name: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Bound on each engine attempt; an attempt running longer fails as `Timeout`.
    pub timeout_secs: u64,
    /// Environment variable holding the provider key; read by the engine, never by this crate.
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model_name: "models/gemini-2.0-flash-exp".to_string(),
            temperature: 0.1,
            max_tokens: None,
            timeout_secs: 60,
            api_key_env: "GOOGLE_API_KEY".to_string(),
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_name: String,
    /// Texts per embedder call while indexing.
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_name: "BAAI/bge-small-en-v1.5".to_string(),
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Directory for persisted indices; `None` keeps everything in memory.
    pub persist_directory: Option<PathBuf>,
    pub distance_metric: SimilarityMetric,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            persist_directory: Some(PathBuf::from("./data/vector_store")),
            distance_metric: SimilarityMetric::Cosine,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingSettings {
    pub fn to_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub similarity_top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            similarity_top_k: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub mode: AgentMode,
    pub max_iterations: u32,
    /// Advanced mode switches to tool retrieval above this many tools.
    pub tool_retrieval_threshold: usize,
    pub system_prompt: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            mode: AgentMode::Advanced,
            max_iterations: 10,
            tool_retrieval_threshold: 6,
            system_prompt: "You are an expert research assistant designed to answer questions \
                            using retrieval-augmented generation. Always cite your sources and \
                            provide detailed, accurate answers based on the provided context."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_size: 1000,
        }
    }
}

impl CacheSettings {
    pub fn to_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_enabled(self.enabled)
            .with_ttl(Duration::from_secs(self.ttl_secs))
            .with_max_size(self.max_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retryable_kinds: Vec<ErrorKind>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            retryable_kinds: ErrorKind::default_retryable(),
        }
    }
}

impl RetrySettings {
    pub fn to_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_retries)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_retryable_kinds(self.retryable_kinds.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            cooldown_secs: 60,
        }
    }
}

impl CircuitBreakerSettings {
    /// `None` when the breaker is disabled.
    pub fn to_config(&self) -> Option<CircuitBreakerConfig> {
        self.enabled.then(|| {
            CircuitBreakerConfig::new()
                .with_failure_threshold(self.failure_threshold)
                .with_cooldown(Duration::from_secs(self.cooldown_secs))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub input_validation: bool,
    pub max_input_length: usize,
    /// Extra patterns rejected on top of the built-in ones.
    pub blocked_patterns: Vec<String>,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            input_validation: true,
            max_input_length: 10_000,
            blocked_patterns: Vec::new(),
        }
    }
}

impl SecuritySettings {
    pub fn validator(&self) -> Result<QueryValidator> {
        if !self.input_validation {
            return Ok(QueryValidator::disabled());
        }
        self.blocked_patterns
            .iter()
            .try_fold(QueryValidator::new(self.max_input_length), |v, p| {
                v.with_pattern(p)
            })
    }
}

fn invalid(field: &str, msg: impl Into<String>) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("settings"),
    )
}

impl Settings {
    /// Checks cross-field constraints; the first violation is returned.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid("llm.temperature", "must be between 0.0 and 2.0"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs", "must be at least 1"));
        }
        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size", "must be at least 1"));
        }
        if self.chunking.chunk_size < 16 {
            return Err(invalid("chunking.chunk_size", "must be at least 16"));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(invalid(
                "chunking.chunk_overlap",
                format!(
                    "chunk_overlap ({}) must be less than chunk_size ({})",
                    self.chunking.chunk_overlap, self.chunking.chunk_size
                ),
            ));
        }
        if self.retrieval.similarity_top_k == 0 {
            return Err(invalid("retrieval.similarity_top_k", "must be at least 1"));
        }
        if self.agent.max_iterations == 0 {
            return Err(invalid("agent.max_iterations", "must be at least 1"));
        }
        if self.agent.tool_retrieval_threshold == 0 {
            return Err(invalid("agent.tool_retrieval_threshold", "must be at least 1"));
        }
        if self.cache.enabled {
            if self.cache.max_size == 0 {
                return Err(invalid("cache.max_size", "must be at least 1"));
            }
            if self.cache.ttl_secs == 0 {
                return Err(invalid("cache.ttl_secs", "must be at least 1"));
            }
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid(
                "retry.base_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        if self.circuit_breaker.enabled && self.circuit_breaker.failure_threshold == 0 {
            return Err(invalid(
                "circuit_breaker.failure_threshold",
                "must be at least 1",
            ));
        }
        if self.security.max_input_length == 0 {
            return Err(invalid("security.max_input_length", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        s.validate().unwrap();
        assert_eq!(s.llm.provider, "gemini");
        assert_eq!(s.agent.mode, AgentMode::Advanced);
        assert_eq!(s.retry.retryable_kinds.len(), 3);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let mut s = Settings::default();
        s.chunking.chunk_size = 100;
        s.chunking.chunk_overlap = 150;
        let err = s.validate().unwrap_err();
        assert_eq!(
            err.context().unwrap().field_path.as_deref(),
            Some("chunking.chunk_overlap")
        );
    }

    #[test]
    fn zero_batch_size_rejected() {
        let mut s = Settings::default();
        s.embedding.batch_size = 0;
        let err = s.validate().unwrap_err();
        assert_eq!(
            err.context().unwrap().field_path.as_deref(),
            Some("embedding.batch_size")
        );
    }

    #[test]
    fn temperature_range_enforced() {
        let mut s = Settings::default();
        s.llm.temperature = 2.5;
        assert!(s.validate().is_err());
    }

    #[test]
    fn disabled_cache_skips_size_checks() {
        let mut s = Settings::default();
        s.cache.enabled = false;
        s.cache.max_size = 0;
        assert!(s.validate().is_ok());
        s.cache.enabled = true;
        assert!(s.validate().is_err());
    }

    #[test]
    fn conversions() {
        let s = Settings::default();
        let retry = s.retry.to_config();
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.base_delay, Duration::from_secs(1));
        assert!(retry.is_retryable(ErrorKind::Timeout));

        let cache = s.cache.to_config();
        assert_eq!(cache.default_ttl, Duration::from_secs(3600));

        let mut cb = s.circuit_breaker.clone();
        assert!(cb.to_config().is_some());
        cb.enabled = false;
        assert!(cb.to_config().is_none());
    }

    #[test]
    fn extra_blocked_patterns_apply() {
        let mut sec = SecuritySettings::default();
        sec.blocked_patterns.push("rm -rf".to_string());
        let v = sec.validator().unwrap();
        assert!(v.validate("please rm -rf /").is_err());
    }
}
