//! Document ingestion into the in-memory knowledge base

use super::chunker::TextChunker;
use super::search::Bm25Index;
use crate::types::{AppError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const SUPPORTED_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// A chunk of an ingested document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub id: String,
    /// File name the chunk came from
    pub source: String,
    pub text: String,
}

/// Chunked documents plus the BM25 index over them
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    chunks: HashMap<String, DocumentChunk>,
    index: Bm25Index,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self {
            chunks: HashMap::new(),
            index: Bm25Index::new(),
        }
    }

    /// Ingest every `.md` / `.txt` file of a directory (non-recursive)
    ///
    /// A missing directory yields an empty knowledge base and a warning.
    pub fn from_dir<P: AsRef<Path>>(dir: P, chunker: &TextChunker) -> Result<Self> {
        let dir = dir.as_ref();
        let mut kb = Self::new();

        if !dir.exists() {
            warn!("Documents directory does not exist: {}", dir.display());
            return Ok(kb);
        }

        let entries = fs::read_dir(dir).map_err(|e| {
            AppError::Configuration(format!("Cannot read documents dir {}: {}", dir.display(), e))
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                        .unwrap_or(false)
            })
            .collect();
        paths.sort();

        for path in &paths {
            let content = fs::read_to_string(path).map_err(|e| {
                AppError::Internal(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let added = kb.add_document(&source, &content, chunker);
            debug!("Ingested {} ({} chunks)", source, added);
        }

        info!(
            "Knowledge base ready: {} documents, {} chunks",
            paths.len(),
            kb.len()
        );
        Ok(kb)
    }

    /// Chunk and index one document, returning the number of chunks added
    pub fn add_document(&mut self, source: &str, content: &str, chunker: &TextChunker) -> usize {
        let chunks = chunker.chunk(content);
        let count = chunks.len();
        for (i, text) in chunks.into_iter().enumerate() {
            let id = format!("{}#{}", source, i);
            self.index.add_document(&id, &text);
            self.chunks.insert(
                id.clone(),
                DocumentChunk {
                    id,
                    source: source.to_string(),
                    text,
                },
            );
        }
        count
    }

    /// Best matching chunks with their BM25 scores
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(&DocumentChunk, f32)> {
        self.index
            .search(query, top_k)
            .into_iter()
            .filter_map(|(id, score)| self.chunks.get(&id).map(|chunk| (chunk, score)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
