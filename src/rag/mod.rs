//! Document retrieval for the documentation agent
//!
//! # Module Structure
//!
//! - [`rag::chunker`](crate::rag::chunker) - Word-window text chunking
//! - [`rag::search`](crate::rag::search) - BM25 lexical index
//! - [`rag::ingest`](crate::rag::ingest) - Loading a documents directory into a [`KnowledgeBase`]
//!
//! The documentation agent only sees the [`DocumentRetriever`] trait:
//! `retrieve(query) -> (text, confidence)`. [`KeywordRetriever`] is the
//! default implementation over the local knowledge base.

pub mod chunker;
pub mod ingest;
pub mod search;

pub use chunker::TextChunker;
pub use ingest::{DocumentChunk, KnowledgeBase};

use crate::types::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Text retrieved for a query and how confident the retriever is in it
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub text: String,
    /// In `[0, 1]`
    pub confidence: f32,
}

/// Retrieval collaborator consumed by the documentation agent
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Retrieval>;
}

/// BM25 retrieval over a [`KnowledgeBase`]
pub struct KeywordRetriever {
    kb: Arc<KnowledgeBase>,
    top_k: usize,
}

impl KeywordRetriever {
    pub const NO_MATCH: &'static str = "No matching documentation found in the knowledge base.";

    pub fn new(kb: Arc<KnowledgeBase>, top_k: usize) -> Self {
        Self {
            kb,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl DocumentRetriever for KeywordRetriever {
    async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let hits = self.kb.search(query, self.top_k);
        let Some((_, top_score)) = hits.first() else {
            return Ok(Retrieval {
                text: Self::NO_MATCH.to_string(),
                confidence: 0.0,
            });
        };

        // Map the unbounded BM25 score onto [0, 1)
        let confidence = top_score / (top_score + 1.0);
        let text = hits
            .iter()
            .map(|(chunk, _)| format!("[{}] {}", chunk.source, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(Retrieval { text, confidence })
    }
}
