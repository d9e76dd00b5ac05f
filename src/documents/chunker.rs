//! Sentence-aware word chunking.

use super::{Chunk, Document, DocumentMetadata};
use crate::{Error, ErrorContext, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Chunk sizes are measured in whitespace-separated words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::invalid_argument(
                "chunk_size must be positive",
                ErrorContext::new()
                    .with_field_path("chunk_size")
                    .with_source("chunker"),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(Error::invalid_argument(
                format!(
                    "chunk_overlap ({}) must be less than chunk_size ({})",
                    config.chunk_overlap, config.chunk_size
                ),
                ErrorContext::new()
                    .with_field_path("chunk_overlap")
                    .with_source("chunker"),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Splits every page of `doc`; chunks never span pages.
    ///
    /// Each chunk carries `file_name`, `page_label` and `chunk_index`
    /// metadata. `chunk_index` counts across the whole document.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in &doc.pages {
            for text in self.split_text(&page.text) {
                let index = chunks.len();
                let mut metadata = BTreeMap::new();
                metadata.insert("file_name".to_string(), doc.name.clone());
                metadata.insert("page_label".to_string(), page.label.clone());
                metadata.insert("chunk_index".to_string(), index.to_string());
                chunks.push(Chunk {
                    id: format!("{}-{}", doc.name, index),
                    doc_name: doc.name.clone(),
                    text,
                    metadata,
                });
            }
        }
        debug!(
            document = %doc.name,
            pages = doc.pages.len(),
            chunks = chunks.len(),
            "document chunked"
        );
        chunks
    }

    /// Chunks `doc` and describes the result.
    pub fn process(&self, doc: &Document) -> (Vec<Chunk>, DocumentMetadata) {
        let chunks = self.chunk_document(doc);
        let metadata = DocumentMetadata::describe(doc, chunks.len());
        (chunks, metadata)
    }

    /// Packs whole sentences into chunks of at most `chunk_size` words.
    ///
    /// Sentences longer than a chunk are cut at word boundaries. Each new
    /// chunk starts with up to `chunk_overlap` trailing words of the previous
    /// one, shortened when needed to stay within `chunk_size`.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let pieces = split_sentences(text)
            .into_iter()
            .flat_map(|sentence| {
                sentence
                    .chunks(size)
                    .map(|c| c.to_vec())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<Vec<&str>>>();

        let mut out = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        // Words in `current` that did not come from the previous chunk.
        let mut fresh = 0usize;

        for piece in pieces {
            if fresh > 0 && current.len() + piece.len() > size {
                out.push(current.join(" "));
                let keep = overlap.min(size - piece.len()).min(current.len());
                current = current.split_off(current.len() - keep);
                fresh = 0;
            }
            fresh += piece.len();
            current.extend(piece);
        }
        if fresh > 0 {
            out.push(current.join(" "));
        }
        out
    }
}

/// Sentence boundaries are `.`, `!` or `?` at the end of a word.
fn split_sentences(text: &str) -> Vec<Vec<&str>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();
    for word in text.split_whitespace() {
        current.push(word);
        if word.ends_with(['.', '!', '?']) {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}
