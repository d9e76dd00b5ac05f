//! Settings loading: YAML file, then `AGENTIC_RAG_*` environment overrides,
//! then validation.

use super::settings::Settings;
use crate::{Error, ErrorContext, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "AGENTIC_RAG_";

/// Environment variable naming the settings file for the CLI.
pub const CONFIG_PATH_ENV: &str = "AGENTIC_RAG_CONFIG";

impl Settings {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read settings file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("settings_loader"),
            )
        })?;
        debug!(path = %path.display(), "loaded settings file");
        Self::from_yaml_str(&content)
    }

    /// Full load: optional file (defaults otherwise), process environment, validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        settings.apply_env_overrides()?;
        settings.validate()?;
        info!(
            environment = ?settings.environment,
            mode = ?settings.agent.mode,
            cache_enabled = settings.cache.enabled,
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`, which receives full variable names
    /// (`AGENTIC_RAG_CACHE_TTL_SECS`, ...).
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        env.set("ENVIRONMENT", &mut self.environment)?;
        env.set("DOCS_DIR", &mut self.docs_dir)?;

        env.set("LLM_PROVIDER", &mut self.llm.provider)?;
        env.set("LLM_MODEL_NAME", &mut self.llm.model_name)?;
        env.set("LLM_TEMPERATURE", &mut self.llm.temperature)?;
        env.set("LLM_MAX_TOKENS", &mut self.llm.max_tokens)?;
        env.set("LLM_TIMEOUT_SECS", &mut self.llm.timeout_secs)?;

        env.set("EMBEDDING_MODEL_NAME", &mut self.embedding.model_name)?;
        env.set("EMBEDDING_BATCH_SIZE", &mut self.embedding.batch_size)?;
        env.set("VECTOR_STORE_PERSIST_DIRECTORY", &mut self.vector_store.persist_directory)?;

        env.set("CHUNKING_CHUNK_SIZE", &mut self.chunking.chunk_size)?;
        env.set("CHUNKING_CHUNK_OVERLAP", &mut self.chunking.chunk_overlap)?;
        env.set("RETRIEVAL_SIMILARITY_TOP_K", &mut self.retrieval.similarity_top_k)?;

        env.set("AGENT_MODE", &mut self.agent.mode)?;
        env.set("AGENT_MAX_ITERATIONS", &mut self.agent.max_iterations)?;
        env.set("AGENT_TOOL_RETRIEVAL_THRESHOLD", &mut self.agent.tool_retrieval_threshold)?;

        env.set("CACHE_ENABLED", &mut self.cache.enabled)?;
        env.set("CACHE_TTL_SECS", &mut self.cache.ttl_secs)?;
        env.set("CACHE_MAX_SIZE", &mut self.cache.max_size)?;

        env.set("RETRY_MAX_RETRIES", &mut self.retry.max_retries)?;
        env.set("RETRY_BASE_DELAY_MS", &mut self.retry.base_delay_ms)?;
        env.set("RETRY_MAX_DELAY_MS", &mut self.retry.max_delay_ms)?;

        env.set("CIRCUIT_BREAKER_ENABLED", &mut self.circuit_breaker.enabled)?;
        env.set("CIRCUIT_BREAKER_FAILURE_THRESHOLD", &mut self.circuit_breaker.failure_threshold)?;
        env.set("CIRCUIT_BREAKER_COOLDOWN_SECS", &mut self.circuit_breaker.cooldown_secs)?;

        env.set("LOG_LEVEL", &mut self.logging.level)?;
        env.set("LOG_FORMAT", &mut self.logging.format)?;

        env.set("SECURITY_INPUT_VALIDATION", &mut self.security.input_validation)?;
        env.set("SECURITY_MAX_INPUT_LENGTH", &mut self.security.max_input_length)?;
        Ok(())
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Overwrites `slot` when the variable is set. Values are parsed as YAML
    /// scalars so numbers, booleans and snake_case enum names all work.
    fn set<T: DeserializeOwned>(&self, suffix: &str, slot: &mut T) -> Result<()> {
        let name = format!("{}{}", ENV_PREFIX, suffix);
        let Some(raw) = (self.lookup)(&name) else {
            return Ok(());
        };
        *slot = serde_yaml::from_str(&raw).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid value for {}: {}", name, e),
                ErrorContext::new()
                    .with_field_path(name.clone())
                    .with_details(raw.clone())
                    .with_source("settings_loader"),
            )
        })?;
        debug!(var = %name, "applied environment override");
        Ok(())
    }
}
