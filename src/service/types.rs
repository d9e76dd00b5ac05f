//! Request and response types of the query path.

use crate::agent::ToolSpec;
use crate::config::Settings;
use crate::vector_store::ScoredChunk;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ToolContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Retrieval depth; the configured default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Page labels to restrict vector search to; empty means all pages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_numbers: Vec<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            page_numbers: Vec::new(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_pages<S: Into<String>>(mut self, pages: impl IntoIterator<Item = S>) -> Self {
        self.page_numbers = pages.into_iter().map(Into::into).collect();
        self
    }
}

/// What the engine produced for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineAnswer {
    pub answer: String,
    /// Document names the answer draws on.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub retrieved_chunks: Vec<ScoredChunk>,
}

impl EngineAnswer {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub request_id: Uuid,
    pub query: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub retrieved_chunks: Vec<ScoredChunk>,
    /// Names of the tools offered to the engine.
    pub tools: Vec<String>,
    pub model: String,
    pub latency_ms: f64,
    pub cache_hit: bool,
    pub created_at: DateTime<Utc>,
}

/// Model and agent-loop parameters from the `llm` and `agent` settings
/// sections, passed through to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    pub provider: String,
    pub model_name: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Environment variable holding the provider key.
    pub api_key_env: String,
    /// Upper bound on tool-calling rounds within one answer.
    pub max_iterations: u32,
    pub system_prompt: String,
}

impl EngineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            provider: settings.llm.provider.clone(),
            model_name: settings.llm.model_name.clone(),
            temperature: settings.llm.temperature,
            max_tokens: settings.llm.max_tokens,
            api_key_env: settings.llm.api_key_env.clone(),
            max_iterations: settings.agent.max_iterations,
            system_prompt: settings.agent.system_prompt.clone(),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// The external agent/LLM layer.
///
/// Failures must carry a meaningful [`ErrorKind`](crate::error_kind::ErrorKind);
/// the retry policy acts on nothing else. Each attempt is bounded by
/// `llm.timeout_secs`; model parameters are available through
/// [`ToolContext::options`].
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// `request.query` is already validated and trimmed and `request.top_k`
    /// is resolved.
    async fn answer(
        &self,
        request: &QueryRequest,
        tools: &[ToolSpec],
        context: &ToolContext,
    ) -> Result<EngineAnswer>;
}
