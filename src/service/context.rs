//! Tool execution handed to the engine.

use super::EngineOptions;
use crate::agent::{ToolKind, ToolSpec};
use crate::documents::Chunk;
use crate::vector_store::{Embedder, MetadataFilter, ScoredChunk, VectorStore};
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Runs the per-document tools against the loaded indices.
///
/// Vector tools embed the query and search the document's index, optionally
/// restricted to page labels. Summary tools return the whole document in
/// chunk order for the engine to condense.
pub struct ToolContext {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunks: HashMap<String, Vec<Chunk>>,
    top_k: usize,
    options: Arc<EngineOptions>,
}

impl ToolContext {
    pub(crate) fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chunks: HashMap<String, Vec<Chunk>>,
        top_k: usize,
        options: Arc<EngineOptions>,
    ) -> Self {
        Self {
            store,
            embedder,
            chunks,
            top_k,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Default retrieval depth for vector search.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn documents(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.chunks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn vector_search(
        &self,
        document: &str,
        query: &str,
        page_numbers: &[String],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if !self.chunks.contains_key(document) {
            return Err(unknown_document(document));
        }
        let embedding = self.embedder.embed_one(query).await?;
        let filter = (!page_numbers.is_empty()).then(|| MetadataFilter::pages(page_numbers.iter().cloned()));
        let hits = self
            .store
            .query(document, &embedding, top_k, filter.as_ref())
            .await?;
        debug!(document, hits = hits.len(), "vector tool ran");
        Ok(hits)
    }

    pub fn summary_chunks(&self, document: &str) -> Result<&[Chunk]> {
        self.chunks
            .get(document)
            .map(Vec::as_slice)
            .ok_or_else(|| unknown_document(document))
    }

    /// Runs `tool` for `query`; summary passages score 1.0.
    pub async fn invoke(
        &self,
        tool: &ToolSpec,
        query: &str,
        page_numbers: &[String],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        match tool.kind {
            ToolKind::Vector => {
                self.vector_search(&tool.document, query, page_numbers, top_k)
                    .await
            }
            ToolKind::Summary => Ok(self
                .summary_chunks(&tool.document)?
                .iter()
                .map(|c| ScoredChunk {
                    id: c.id.clone(),
                    text: c.text.clone(),
                    metadata: c.metadata.clone(),
                    score: 1.0,
                })
                .collect()),
        }
    }
}

fn unknown_document(document: &str) -> Error {
    Error::not_found(
        format!("document '{}' is not loaded", document),
        ErrorContext::new()
            .with_field_path("document")
            .with_source("tool_context"),
    )
}
