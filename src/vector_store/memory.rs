//! In-memory vector store with JSON persistence.

use super::similarity::{find_most_similar, SimilarityMetric};
use super::{IndexedChunk, MetadataFilter, ScoredChunk, VectorStore};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    name: String,
    chunks: Vec<IndexedChunk>,
}

/// Indices live in a shared map; when a directory is configured each index
/// persists as `<dir>/<name>.json`.
pub struct MemoryVectorStore {
    indices: RwLock<HashMap<String, Arc<Vec<IndexedChunk>>>>,
    persist_dir: Option<PathBuf>,
    metric: SimilarityMetric,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(HashMap::new()),
            persist_dir: None,
            metric: SimilarityMetric::Cosine,
        }
    }

    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }

    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn persist_dir(&self) -> Option<&Path> {
        self.persist_dir.as_deref()
    }

    fn get(&self, name: &str) -> Option<Arc<Vec<IndexedChunk>>> {
        self.indices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn index_path(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        let dir = self.persist_dir.as_ref().ok_or_else(|| {
            Error::configuration_with_context(
                "vector store has no persist directory",
                ErrorContext::new()
                    .with_field_path("vector_store.persist_directory")
                    .with_source("memory_vector_store"),
            )
        })?;
        Ok(dir.join(format!("{}.json", name)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Index names become file names: no separators, no leading dot.
fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(Error::invalid_argument(
            format!("invalid index name: {:?}", name),
            ErrorContext::new()
                .with_field_path("name")
                .with_source("memory_vector_store"),
        ));
    }
    Ok(())
}

fn missing(name: &str) -> Error {
    Error::not_found(
        format!("index '{}' does not exist", name),
        ErrorContext::new()
            .with_field_path("name")
            .with_source("memory_vector_store"),
    )
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_index(&self, name: &str, chunks: Vec<IndexedChunk>, force: bool) -> Result<()> {
        check_name(name)?;
        if let Some(first) = chunks.first() {
            let dim = first.embedding.len();
            if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
                return Err(Error::invalid_argument(
                    format!(
                        "chunk '{}' has dimension {}, expected {}",
                        bad.id,
                        bad.embedding.len(),
                        dim
                    ),
                    ErrorContext::new().with_source("memory_vector_store"),
                ));
            }
        }

        let count = chunks.len();
        {
            let mut indices = self.indices.write().unwrap_or_else(PoisonError::into_inner);
            if indices.contains_key(name) && !force {
                return Err(Error::invalid_argument(
                    format!("index '{}' already exists", name),
                    ErrorContext::new()
                        .with_field_path("name")
                        .with_details("pass force to overwrite")
                        .with_source("memory_vector_store"),
                ));
            }
            indices.insert(name.to_string(), Arc::new(chunks));
        }
        info!(index = name, chunks = count, "index created");
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Err(Error::invalid_argument(
                "top_k must be positive",
                ErrorContext::new()
                    .with_field_path("top_k")
                    .with_source("memory_vector_store"),
            ));
        }
        let chunks = self.get(name).ok_or_else(|| missing(name))?;
        let candidates: Vec<&IndexedChunk> = chunks
            .iter()
            .filter(|c| filter.map(|f| f.matches(&c.metadata)).unwrap_or(true))
            .collect();

        let ranked = find_most_similar(
            embedding,
            candidates.iter().map(|c| c.embedding.as_slice()),
            top_k,
            self.metric,
        );
        debug!(
            index = name,
            candidates = candidates.len(),
            hits = ranked.len(),
            "index queried"
        );
        Ok(ranked
            .into_iter()
            .map(|r| {
                let c = candidates[r.index];
                ScoredChunk {
                    id: c.id.clone(),
                    text: c.text.clone(),
                    metadata: c.metadata.clone(),
                    score: r.score,
                }
            })
            .collect())
    }

    async fn persist(&self, name: &str) -> Result<()> {
        let path = self.index_path(name)?;
        let chunks = self.get(name).ok_or_else(|| missing(name))?;
        let body = serde_json::to_vec(&PersistedIndex {
            version: FORMAT_VERSION,
            name: name.to_string(),
            chunks: chunks.as_ref().clone(),
        })?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, body).await?;
        info!(index = name, path = %path.display(), "index persisted");
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<()> {
        let path = self.index_path(name)?;
        let body = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing(name)),
            Err(e) => return Err(e.into()),
        };
        let persisted: PersistedIndex = serde_json::from_slice(&body)?;
        if persisted.version != FORMAT_VERSION {
            return Err(Error::invalid_argument(
                format!("unsupported index format version {}", persisted.version),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("memory_vector_store"),
            ));
        }
        let count = persisted.chunks.len();
        self.indices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(persisted.chunks));
        info!(index = name, chunks = count, "index loaded");
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<bool> {
        check_name(name)?;
        let in_memory = self
            .indices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some();
        let mut on_disk = false;
        if self.persist_dir.is_some() {
            let path = self.index_path(name)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => on_disk = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if in_memory || on_disk {
            info!(index = name, "index deleted");
        }
        Ok(in_memory || on_disk)
    }

    async fn list_indices(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .indices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    async fn index_len(&self, name: &str) -> Option<usize> {
        self.get(name).map(|c| c.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_kind::ErrorKind;
    use std::collections::BTreeMap;

    fn chunk(id: &str, page: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            id: id.to_string(),
            text: format!("text of {}", id),
            metadata: BTreeMap::from([("page_label".to_string(), page.to_string())]),
            embedding,
        }
    }

    fn sample() -> Vec<IndexedChunk> {
        vec![
            chunk("a", "1", vec![1.0, 0.0]),
            chunk("b", "2", vec![0.7, 0.7]),
            chunk("c", "3", vec![0.0, 1.0]),
        ]
    }

    #[tokio::test]
    async fn query_ranks_by_cosine() {
        let store = MemoryVectorStore::new();
        store.create_index("paper", sample(), false).await.unwrap();
        let hits = store.query("paper", &[1.0, 0.1], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn page_filter_restricts_candidates() {
        let store = MemoryVectorStore::new();
        store.create_index("paper", sample(), false).await.unwrap();
        let filter = MetadataFilter::pages(["2", "3"]);
        let hits = store
            .query("paper", &[1.0, 0.0], 5, Some(&filter))
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn duplicate_name_needs_force() {
        let store = MemoryVectorStore::new();
        store.create_index("paper", sample(), false).await.unwrap();
        let err = store.create_index("paper", vec![], false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        store.create_index("paper", vec![], true).await.unwrap();
        assert_eq!(store.index_len("paper").await, Some(0));
    }

    #[tokio::test]
    async fn rejects_mixed_dimensions_and_bad_names() {
        let store = MemoryVectorStore::new();
        let mut chunks = sample();
        chunks.push(chunk("d", "4", vec![1.0]));
        assert!(store.create_index("paper", chunks, false).await.is_err());
        assert!(store.create_index("../etc", sample(), false).await.is_err());
        assert!(store.list_indices().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_index_and_zero_top_k() {
        let store = MemoryVectorStore::new();
        let err = store.query("nope", &[1.0], 1, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        store.create_index("paper", sample(), false).await.unwrap();
        let err = store.query("paper", &[1.0, 0.0], 0, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn persist_load_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryVectorStore::new().with_persist_dir(dir.path());
        store.create_index("paper", sample(), false).await.unwrap();
        store.persist("paper").await.unwrap();
        assert!(dir.path().join("paper.json").exists());

        let fresh = MemoryVectorStore::new().with_persist_dir(dir.path());
        fresh.load("paper").await.unwrap();
        assert_eq!(fresh.list_indices().await, vec!["paper".to_string()]);
        assert_eq!(fresh.index_len("paper").await, Some(3));

        assert!(fresh.delete_index("paper").await.unwrap());
        assert!(!dir.path().join("paper.json").exists());
        assert!(!fresh.delete_index("paper").await.unwrap());
        assert_eq!(fresh.load("paper").await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn persist_without_directory_is_configuration_error() {
        let store = MemoryVectorStore::new();
        store.create_index("paper", sample(), false).await.unwrap();
        let err = store.persist("paper").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
