//! # Vector Store
//!
//! Named indices of embedded chunks behind the [`VectorStore`] trait, plus
//! the [`Embedder`] seam that produces the vectors.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`VectorStore`] | Async storage trait: create / query / persist / load / delete |
//! | [`MemoryVectorStore`] | In-process store with optional JSON persistence |
//! | [`Embedder`] | Text to vector; [`HashingEmbedder`] works offline |
//! | [`similarity`] | Cosine, euclidean and dot-product scoring |

mod embedder;
mod memory;
pub mod similarity;

pub use embedder::{Embedder, HashingEmbedder};
pub use memory::MemoryVectorStore;
pub use similarity::{cosine_similarity, find_most_similar, SimilarityMetric, SimilarityResult};

use crate::documents::Chunk;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A chunk with its embedding, as stored in an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub embedding: Vec<f32>,
}

impl IndexedChunk {
    pub fn from_chunk(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id,
            text: chunk.text,
            metadata: chunk.metadata,
            embedding,
        }
    }
}

/// Query hit, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub score: f32,
}

/// Metadata filter with OR semantics: a chunk passes when any
/// `(key, value)` pair matches. An empty filter passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: Vec<(String, String)>,
}

impl MetadataFilter {
    pub fn any_of<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            conditions: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Restricts results to the given page labels.
    pub fn pages<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self::any_of(labels.into_iter().map(|l| ("page_label", l)))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        self.conditions.is_empty()
            || self
                .conditions
                .iter()
                .any(|(k, v)| metadata.get(k).map(|m| m == v).unwrap_or(false))
    }
}

/// Storage for named chunk indices.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Fails with `InvalidArgument` if `name` exists and `force` is false.
    async fn create_index(&self, name: &str, chunks: Vec<IndexedChunk>, force: bool) -> Result<()>;

    /// Top `top_k` chunks of index `name` for `embedding`, best first.
    async fn query(
        &self,
        name: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Writes index `name` to durable storage.
    async fn persist(&self, name: &str) -> Result<()>;

    /// Reads index `name` from durable storage, replacing any in-memory copy.
    async fn load(&self, name: &str) -> Result<()>;

    /// Removes index `name` from memory and durable storage; `false` if it
    /// did not exist anywhere.
    async fn delete_index(&self, name: &str) -> Result<bool>;

    /// Names of the indices currently held, sorted.
    async fn list_indices(&self) -> Vec<String>;

    /// Chunk count of index `name`, if present.
    async fn index_len(&self, name: &str) -> Option<usize>;
}
