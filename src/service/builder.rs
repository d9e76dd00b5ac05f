use super::{EngineOptions, QueryEngine, QueryService};
use crate::agent::{AgentState, ToolPlanner};
use crate::cache::QueryCache;
use crate::config::Settings;
use crate::documents::Chunker;
use crate::metrics::MetricsCollector;
use crate::resilience::{CircuitBreaker, RetryPolicy};
use crate::vector_store::{Embedder, MemoryVectorStore, VectorStore};
use crate::Result;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::info;

/// Builder for [`QueryService`].
///
/// The engine and embedder are required; every other collaborator is
/// derived from [`Settings`] unless injected.
pub struct QueryServiceBuilder {
    engine: Arc<dyn QueryEngine>,
    embedder: Arc<dyn Embedder>,
    settings: Settings,
    store: Option<Arc<dyn VectorStore>>,
    metrics: Option<Arc<MetricsCollector>>,
    breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<RetryPolicy>,
    engine_timeout: Option<Duration>,
}

impl QueryServiceBuilder {
    pub fn new(engine: Arc<dyn QueryEngine>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            engine,
            embedder,
            settings: Settings::default(),
            store: None,
            metrics: None,
            breaker: None,
            retry: None,
            engine_timeout: None,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Defaults to a [`MemoryVectorStore`] using the configured metric and
    /// persist directory.
    pub fn with_vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share a collector with other components.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Share one breaker across services guarding the same engine. Overrides
    /// the `circuit_breaker` settings section.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Replace the policy built from the `retry` section. A breaker passed to
    /// [`Self::with_circuit_breaker`] is still attached.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Bound on each engine attempt; defaults to `llm.timeout_secs`.
    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<QueryService> {
        let settings = self.settings;
        settings.validate()?;

        let validator = settings.security.validator()?;
        let cache = QueryCache::new(settings.cache.to_config())?;
        let chunker = Chunker::new(settings.chunking.to_config())?;
        let planner = ToolPlanner::new(settings.agent.mode, settings.retrieval.similarity_top_k)
            .with_threshold(settings.agent.tool_retrieval_threshold);

        let breaker = self.breaker.or_else(|| {
            settings
                .circuit_breaker
                .to_config()
                .map(|cfg| Arc::new(CircuitBreaker::new(cfg)))
        });
        let mut retry = self
            .retry
            .unwrap_or_else(|| RetryPolicy::new(settings.retry.to_config()));
        if let Some(ref cb) = breaker {
            retry = retry.with_circuit_breaker(Arc::clone(cb));
        }

        let store = self.store.unwrap_or_else(|| {
            let mut memory = MemoryVectorStore::new().with_metric(settings.vector_store.distance_metric);
            if let Some(ref dir) = settings.vector_store.persist_directory {
                memory = memory.with_persist_dir(dir.clone());
            }
            Arc::new(memory)
        });

        let options = Arc::new(EngineOptions::from_settings(&settings));
        let engine_timeout = self.engine_timeout.unwrap_or_else(|| settings.llm.timeout());

        info!(
            app = %settings.app_name,
            environment = ?settings.environment,
            mode = %settings.agent.mode,
            provider = %settings.llm.provider,
            model = %settings.llm.model_name,
            embedding_model = %settings.embedding.model_name,
            engine_timeout_ms = engine_timeout.as_millis() as u64,
            cache_enabled = cache.is_enabled(),
            breaker = breaker.is_some(),
            "query service built"
        );

        Ok(QueryService {
            engine: self.engine,
            embedder: self.embedder,
            store,
            validator,
            cache,
            retry,
            metrics: self.metrics.unwrap_or_default(),
            chunker,
            planner,
            options,
            engine_timeout,
            embed_batch_size: settings.embedding.batch_size.max(1),
            default_top_k: settings.retrieval.similarity_top_k,
            agent: RwLock::new(None),
            state: Mutex::new(AgentState::new(settings.agent.mode)),
            metadata: RwLock::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
        })
    }
}
