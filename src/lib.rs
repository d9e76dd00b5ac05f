//! # agentic-rag
//!
//! Query-path core for an agentic retrieval-augmented generation service:
//! documents are chunked and indexed, queries are validated, answered through
//! an external agent/LLM layer, and memoized.
//!
//! ## Overview
//!
//! The external pieces (the answering engine and the embedding model) are
//! traits this crate calls through, [`QueryEngine`] and
//! [`vector_store::Embedder`]. Everything around them is owned here: the
//! result cache, retry and circuit breaking, input validation, metrics,
//! chunking, vector indices and tool planning.
//!
//! ## Key Features
//!
//! - **Result cache**: TTL plus LRU eviction via [`cache::ResultCache`]
//! - **Resilience**: exponential backoff and a half-open circuit breaker via [`resilience`]
//! - **Tool planning**: eager tools or retrieval-over-tools via [`agent`]
//! - **Configuration**: YAML settings with `AGENTIC_RAG_*` overrides via [`config`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentic_rag::config::Settings;
//! use agentic_rag::documents::Document;
//! use agentic_rag::vector_store::HashingEmbedder;
//! use agentic_rag::{QueryEngine, QueryRequest, QueryService};
//! use std::sync::Arc;
//!
//! # async fn run(engine: Arc<dyn QueryEngine>) -> agentic_rag::Result<()> {
//! let service = QueryService::builder(engine, Arc::new(HashingEmbedder::default()))
//!     .with_settings(Settings::load(None)?)
//!     .build()?;
//! service
//!     .load_documents(vec![Document::from_path("papers/metagpt.txt")?])
//!     .await?;
//! let response = service.query(QueryRequest::new("What is MetaGPT?")).await?;
//! println!("{}", response.answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Result cache, query fingerprints and the query-level cache |
//! | [`resilience`] | Retry policy and circuit breaker |
//! | [`validation`] | Query input validation |
//! | [`metrics`] | Query counts, latency percentiles, cache hit rate |
//! | [`documents`] | Documents, pages and sentence-aware chunking |
//! | [`vector_store`] | Vector indices, similarity and embedders |
//! | [`agent`] | Agent mode, per-document tools, tool retrieval, agent state |
//! | [`service`] | The query service tying it all together |
//! | [`config`] | Settings loading and validation |
//! | [`logging`] | Tracing subscriber setup |

pub mod agent;
pub mod cache;
pub mod config;
pub mod documents;
pub mod error;
pub mod error_kind;
pub mod logging;
pub mod metrics;
pub mod resilience;
pub mod service;
pub mod validation;
pub mod vector_store;

pub use error::{Error, ErrorContext};
pub use error_kind::ErrorKind;
pub use service::{EngineAnswer, EngineOptions, QueryEngine, QueryRequest, QueryResponse, QueryService, QueryServiceBuilder, ToolContext};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
