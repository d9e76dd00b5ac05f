//! # Query Service
//!
//! Ties the query path together:
//!
//! ```text
//! query -> validate -> fingerprint -> QueryCache ──hit──> response
//!                                        │ miss
//!                                        v
//!                     tools (eager | retrieved) -> RetryPolicy(engine)
//!                                        │
//!                         cache put, metrics, agent state -> response
//! ```
//!
//! Documents are loaded once through [`QueryService::load_documents`];
//! querying before that fails with a `Configuration` error. Loading embeds
//! every document before any index is written, so a failed embedding leaves
//! the previous agent and its indices untouched.

mod builder;
mod context;
mod types;

pub use builder::QueryServiceBuilder;
pub use context::ToolContext;
pub use types::{EngineAnswer, EngineOptions, QueryEngine, QueryRequest, QueryResponse};

use crate::agent::{AgentMode, AgentState, AgentStatus, ToolIndex, ToolPlanner, ToolSelection, ToolSpec};
use crate::cache::{CacheStats, QueryCache};
use crate::documents::{Chunker, Document, DocumentMetadata};
use crate::error_kind::ErrorKind;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::resilience::{CircuitBreakerSnapshot, RetryPolicy};
use crate::validation::QueryValidator;
use crate::vector_store::{Embedder, IndexedChunk, VectorStore};
use crate::{Error, ErrorContext, Result};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything produced by a successful `load_documents`.
struct LoadedAgent {
    selection: ToolSelection,
    tool_index: Option<ToolIndex>,
    context: ToolContext,
}

/// A fully embedded document set whose indices are not written yet.
struct StagedLoad {
    agent: LoadedAgent,
    metadata: HashMap<String, DocumentMetadata>,
    indices: Vec<(String, Vec<IndexedChunk>)>,
}

/// Counts a query as in flight until dropped, including on cancellation.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct QueryService {
    engine: Arc<dyn QueryEngine>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    validator: QueryValidator,
    cache: QueryCache<QueryResponse>,
    retry: RetryPolicy,
    metrics: Arc<MetricsCollector>,
    chunker: Chunker,
    planner: ToolPlanner,
    options: Arc<EngineOptions>,
    engine_timeout: Duration,
    embed_batch_size: usize,
    default_top_k: usize,
    agent: RwLock<Option<Arc<LoadedAgent>>>,
    state: Mutex<AgentState>,
    metadata: RwLock<HashMap<String, DocumentMetadata>>,
    in_flight: AtomicUsize,
}

impl QueryService {
    pub fn builder(engine: Arc<dyn QueryEngine>, embedder: Arc<dyn Embedder>) -> QueryServiceBuilder {
        QueryServiceBuilder::new(engine, embedder)
    }

    /// Chunks, embeds and indexes `documents`, builds their tools and makes
    /// the agent ready. Replaces any previously loaded set and clears the
    /// query cache.
    ///
    /// Failures before any index is written keep the previous agent. A
    /// failure while writing indices drops it, since the store may then hold
    /// a mix of old and new documents.
    pub async fn load_documents(&self, documents: Vec<Document>) -> Result<AgentState> {
        self.update_state(|s| {
            s.status = AgentStatus::Initializing;
            s.mode = self.planner.mode;
        });
        let staged = match self.stage(documents).await {
            Ok(staged) => staged,
            Err(e) => return Err(self.load_failed(e, false)),
        };
        let StagedLoad {
            agent,
            metadata,
            indices,
        } = staged;
        for (name, indexed) in indices {
            if let Err(e) = self.store.create_index(&name, indexed, true).await {
                return Err(self.load_failed(e, true));
            }
        }

        let num_documents = metadata.len();
        let num_chunks = metadata.values().map(|m| m.num_chunks).sum();
        *self.metadata.write().unwrap_or_else(PoisonError::into_inner) = metadata;
        *self.agent.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(agent));
        self.cache.clear();
        let state = self.update_state(|s| {
            s.status = AgentStatus::Ready;
            s.num_documents = num_documents;
            s.num_chunks = num_chunks;
        });
        info!(
            documents = num_documents,
            chunks = num_chunks,
            mode = %self.planner.mode,
            "agent ready"
        );
        Ok(state)
    }

    fn load_failed(&self, err: Error, discard_agent: bool) -> Error {
        error!(error = %err, discard_agent, "failed to load documents");
        if discard_agent {
            *self.agent.write().unwrap_or_else(PoisonError::into_inner) = None;
            self.metadata
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            self.cache.clear();
        }
        self.update_state(|s| {
            s.status = AgentStatus::Error;
            if discard_agent {
                s.num_documents = 0;
                s.num_chunks = 0;
            }
        });
        err
    }

    /// Chunks and embeds every document and builds the tools, without
    /// touching the store.
    async fn stage(&self, documents: Vec<Document>) -> Result<StagedLoad> {
        if documents.is_empty() {
            return Err(Error::invalid_argument(
                "at least one document is required",
                ErrorContext::new()
                    .with_field_path("documents")
                    .with_source("query_service"),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = documents.iter().find(|d| !seen.insert(d.name.as_str())) {
            return Err(Error::invalid_argument(
                format!("duplicate document name '{}'", dup.name),
                ErrorContext::new()
                    .with_field_path("documents")
                    .with_source("query_service"),
            ));
        }

        let mut names = Vec::with_capacity(documents.len());
        let mut chunks_by_doc = HashMap::new();
        let mut metadata = HashMap::new();
        let mut indices = Vec::with_capacity(documents.len());
        for doc in &documents {
            let (chunks, meta) = self.chunker.process(doc);
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let mut embeddings = Vec::with_capacity(texts.len());
            for batch in texts.chunks(self.embed_batch_size) {
                embeddings.extend(self.embedder.embed(batch).await?);
            }
            if embeddings.len() != chunks.len() {
                return Err(Error::upstream(
                    ErrorKind::NonRetryable,
                    format!(
                        "embedder returned {} vectors for {} chunks of '{}'",
                        embeddings.len(),
                        chunks.len(),
                        doc.name
                    ),
                ));
            }
            let indexed = chunks
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(c, e)| IndexedChunk::from_chunk(c, e))
                .collect();
            info!(
                document = %doc.name,
                pages = meta.num_pages,
                chunks = meta.num_chunks,
                "document embedded"
            );
            indices.push((doc.name.clone(), indexed));
            names.push(doc.name.clone());
            chunks_by_doc.insert(doc.name.clone(), chunks);
            metadata.insert(doc.name.clone(), meta);
        }

        let selection = self.planner.plan(&names);
        let tool_index = match selection {
            ToolSelection::Retrieved { ref tools, top_k } => Some(
                ToolIndex::build(tools.clone(), Arc::clone(&self.embedder), top_k).await?,
            ),
            ToolSelection::Eager(_) => None,
        };
        let context = ToolContext::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            chunks_by_doc,
            self.default_top_k,
            Arc::clone(&self.options),
        );
        Ok(StagedLoad {
            agent: LoadedAgent {
                selection,
                tool_index,
                context,
            },
            metadata,
            indices,
        })
    }

    /// Answers one query.
    ///
    /// Cache hits are returned with `cache_hit = true` and never reach the
    /// engine. Engine failures come back as annotated by the retry policy.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let started = Instant::now();
        let agent = self
            .agent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "agent not initialized; load documents first",
                    ErrorContext::new().with_source("query_service"),
                )
            })?;

        let query = self.validator.validate(&request.query)?;
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Err(Error::invalid_argument(
                "top_k must be positive",
                ErrorContext::new()
                    .with_field_path("top_k")
                    .with_source("query_service"),
            ));
        }
        let request = QueryRequest {
            query,
            top_k: Some(top_k),
            page_numbers: request.page_numbers,
        };

        let key = self.cache.key_for(&request.query, &fingerprint_params(&request));
        if let Some(mut cached) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            self.metrics.record_query(started.elapsed(), true);
            cached.cache_hit = true;
            info!(request_id = %cached.request_id, "returning cached answer");
            return Ok(cached);
        }
        self.metrics.record_cache_miss();

        let _in_flight = InFlight::enter(&self.in_flight);
        match self.run_engine(&agent, &request).await {
            Ok((answer, tools)) => {
                let latency = started.elapsed();
                let response = QueryResponse {
                    request_id: Uuid::new_v4(),
                    query: request.query,
                    answer: answer.answer,
                    sources: answer.sources,
                    retrieved_chunks: answer.retrieved_chunks,
                    tools,
                    model: self.options.model_name.clone(),
                    latency_ms: latency.as_secs_f64() * 1000.0,
                    cache_hit: false,
                    created_at: Utc::now(),
                };
                if let Err(e) = self.cache.put(&key, response.clone()) {
                    warn!(error = %e, "failed to cache response");
                }
                self.metrics.record_query(latency, true);
                self.update_state(|s| {
                    s.status = AgentStatus::Ready;
                    s.last_query_at = Some(response.created_at);
                });
                info!(
                    request_id = %response.request_id,
                    latency_ms = response.latency_ms,
                    answer_len = response.answer.len(),
                    "query completed"
                );
                Ok(response)
            }
            Err(e) => {
                self.metrics.record_query(started.elapsed(), false);
                self.update_state(|s| s.status = AgentStatus::Error);
                error!(
                    kind = %e.kind(),
                    attempts = e.attempts().unwrap_or(1),
                    error = %e,
                    "query failed"
                );
                Err(e)
            }
        }
    }

    async fn run_engine(
        &self,
        agent: &LoadedAgent,
        request: &QueryRequest,
    ) -> Result<(EngineAnswer, Vec<String>)> {
        let tools: Vec<ToolSpec> = match agent.tool_index {
            Some(ref index) => index.retrieve(&request.query).await?,
            None => agent.selection.tools().to_vec(),
        };
        let answer = self
            .retry
            .execute(|| self.attempt(request, &tools, &agent.context))
            .await?;
        Ok((answer, tools.into_iter().map(|t| t.name).collect()))
    }

    /// One engine call, bounded by `llm.timeout_secs`.
    async fn attempt(
        &self,
        request: &QueryRequest,
        tools: &[ToolSpec],
        context: &ToolContext,
    ) -> Result<EngineAnswer> {
        match tokio::time::timeout(self.engine_timeout, self.engine.answer(request, tools, context)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.engine_timeout.as_millis() as u64, "engine attempt timed out");
                Err(Error::upstream(
                    ErrorKind::Timeout,
                    format!(
                        "engine did not answer within {} ms",
                        self.engine_timeout.as_millis()
                    ),
                ))
            }
        }
    }

    /// Current state; `Processing` while at least one query is running
    /// against a loaded agent.
    pub fn agent_state(&self) -> AgentState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if matches!(state.status, AgentStatus::Ready | AgentStatus::Error)
            && self.in_flight.load(Ordering::SeqCst) > 0
        {
            state.status = AgentStatus::Processing;
        }
        state
    }

    /// Model and agent-loop parameters handed to the engine.
    pub fn engine_options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn mode(&self) -> AgentMode {
        self.planner.mode
    }

    /// Loaded document names, sorted.
    pub fn documents(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn document_metadata(&self, name: &str) -> Option<DocumentMetadata> {
        self.metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Every tool built for the loaded documents (before any retrieval).
    pub fn tools(&self) -> Vec<ToolSpec> {
        self.agent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.selection.tools().to_vec())
            .unwrap_or_default()
    }

    pub fn uses_tool_retrieval(&self) -> bool {
        self.agent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.selection.uses_retrieval())
            .unwrap_or(false)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn circuit_breaker(&self) -> Option<CircuitBreakerSnapshot> {
        self.retry.circuit_breaker().map(|cb| cb.snapshot())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Writes every loaded document index to the store's durable storage.
    pub async fn persist_indices(&self) -> Result<usize> {
        let names = self.documents();
        for name in &names {
            self.store.persist(name).await?;
        }
        Ok(names.len())
    }

    /// Drops the loaded agent, cached answers and metrics, and closes the
    /// breaker. Indices stay in the vector store.
    pub fn reset(&self) {
        *self.agent.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.metadata
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.cache.clear();
        self.metrics.reset();
        if let Some(cb) = self.retry.circuit_breaker() {
            cb.reset();
        }
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = AgentState::new(self.planner.mode);
        info!("query service reset");
    }

    fn update_state(&self, f: impl FnOnce(&mut AgentState)) -> AgentState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
        state.clone()
    }
}

/// Parameters that change the answer and therefore the cache key.
fn fingerprint_params(request: &QueryRequest) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    if let Some(k) = request.top_k {
        params.insert("top_k".to_string(), k.to_string());
    }
    if !request.page_numbers.is_empty() {
        let mut pages = request.page_numbers.clone();
        pages.sort();
        params.insert("pages".to_string(), pages.join(","));
    }
    params
}
