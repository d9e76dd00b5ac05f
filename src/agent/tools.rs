//! Per-document tool descriptions and tool retrieval.

use crate::error_kind::ErrorKind;
use crate::vector_store::{find_most_similar, Embedder, SimilarityMetric};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Semantic search over one document; accepts page filters.
    Vector,
    /// Whole-document overview.
    Summary,
}

/// What the answering engine is told about a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub kind: ToolKind,
    /// Document (and vector index) the tool answers from.
    pub document: String,
    pub description: String,
}

impl ToolSpec {
    pub fn vector(document: &str) -> Self {
        Self {
            name: format!("vector_tool_{}", document),
            kind: ToolKind::Vector,
            document: document.to_string(),
            description: format!(
                "Useful for answering specific questions about {}. \
                 Use this when you need detailed information from the document.",
                document
            ),
        }
    }

    pub fn summary(document: &str) -> Self {
        Self {
            name: format!("summary_tool_{}", document),
            kind: ToolKind::Summary,
            document: document.to_string(),
            description: format!(
                "Useful for getting a high-level summary of {}. \
                 Use this when you need an overview of the document.",
                document
            ),
        }
    }

    /// Vector tool then summary tool.
    pub fn for_document(document: &str) -> [Self; 2] {
        [Self::vector(document), Self::summary(document)]
    }
}

/// Embedded tool descriptions, searched per query.
pub struct ToolIndex {
    tools: Vec<ToolSpec>,
    embeddings: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl std::fmt::Debug for ToolIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolIndex")
            .field("tools", &self.tools.len())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl ToolIndex {
    pub async fn build(
        tools: Vec<ToolSpec>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
    ) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::invalid_argument(
                "top_k must be positive",
                ErrorContext::new()
                    .with_field_path("top_k")
                    .with_source("tool_index"),
            ));
        }
        let texts: Vec<String> = tools
            .iter()
            .map(|t| format!("{}: {}", t.name, t.description))
            .collect();
        let embeddings = embedder.embed(&texts).await?;
        if embeddings.len() != tools.len() {
            return Err(Error::upstream(
                ErrorKind::NonRetryable,
                format!(
                    "embedder returned {} vectors for {} tools",
                    embeddings.len(),
                    tools.len()
                ),
            ));
        }
        debug!(tools = tools.len(), top_k, "tool index built");
        Ok(Self {
            tools,
            embeddings,
            embedder,
            top_k,
        })
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The `top_k` tools whose descriptions best match `query`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ToolSpec>> {
        let q = self.embedder.embed_one(query).await?;
        let ranked = find_most_similar(
            &q,
            self.embeddings.iter().map(Vec::as_slice),
            self.top_k,
            SimilarityMetric::Cosine,
        );
        Ok(ranked
            .into_iter()
            .map(|r| self.tools[r.index].clone())
            .collect())
    }
}
