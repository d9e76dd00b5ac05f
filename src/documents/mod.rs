//! # Documents
//!
//! Paged source documents, their chunks, and per-document statistics.
//!
//! Parsing of binary formats happens upstream; a [`Document`] is plain text
//! organized by page label. Text files can be loaded directly, with form
//! feeds (`\x0c`) separating pages.

mod chunker;

pub use chunker::{Chunker, ChunkerConfig};

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier; also used to name the document's index and tools.
    pub name: String,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pages: Vec::new(),
        }
    }

    pub fn with_page(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.push(Page {
            label: label.into(),
            text: text.into(),
        });
        self
    }

    /// Splits `text` into pages at form feeds, labelled from "1".
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        text.split('\x0c')
            .enumerate()
            .fold(Self::new(name), |doc, (i, page)| {
                doc.with_page((i + 1).to_string(), page)
            })
    }

    /// Reads a UTF-8 text file; the document is named after the file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                Error::invalid_argument(
                    "document path has no usable file name",
                    ErrorContext::new()
                        .with_details(path.display().to_string())
                        .with_source("documents"),
                )
            })?
            .to_string();
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(name, &text))
    }

    /// All page texts joined by newlines.
    pub fn content(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A retrievable slice of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub doc_name: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub name: String,
    pub num_pages: usize,
    pub num_chunks: usize,
    pub total_words: usize,
    /// Hex SHA-256 of [`Document::content`].
    pub content_hash: String,
}

impl DocumentMetadata {
    pub fn describe(doc: &Document, num_chunks: usize) -> Self {
        let content = doc.content();
        Self {
            name: doc.name.clone(),
            num_pages: doc.pages.len(),
            num_chunks,
            total_words: content.split_whitespace().count(),
            content_hash: content_hash(&content),
        }
    }
}

pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Size distribution of a chunk set, in characters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkStats {
    pub num_chunks: usize,
    pub avg_chunk_size: f64,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub total_chars: usize,
}

impl ChunkStats {
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }
        let sizes: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        let total: usize = sizes.iter().sum();
        Self {
            num_chunks: sizes.len(),
            avg_chunk_size: total as f64 / sizes.len() as f64,
            min_chunk_size: sizes.iter().copied().min().unwrap_or(0),
            max_chunk_size: sizes.iter().copied().max().unwrap_or(0),
            total_chars: total,
        }
    }
}

/// Sorted file names in `dir` whose extension is one of `extensions`
/// (case-insensitive, without the dot).
pub fn list_documents(dir: impl AsRef<Path>, extensions: &[&str]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if let (true, Some(name)) = (matches, path.file_name().and_then(|n| n.to_str())) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
