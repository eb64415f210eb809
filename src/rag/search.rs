//! Lexical search over the knowledge base
//!
//! The documentation agent only needs keyword relevance, so the index is a
//! plain in-memory BM25 built at startup from the ingested chunks.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

// ============================================================================
// BM25 Implementation
// ============================================================================

/// BM25 search index for lexical matching
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// Document ID -> tokenized content
    documents: HashMap<String, Vec<String>>,
    /// Term -> document IDs containing term
    inverted_index: HashMap<String, HashSet<String>>,
    /// Document frequencies for each term
    document_frequencies: HashMap<String, usize>,
    total_tokens: usize,
    /// BM25 k1 parameter (term frequency saturation)
    k1: f32,
    /// BM25 b parameter (length normalization)
    b: f32,
}

impl Bm25Index {
    /// Create a new BM25 index with default parameters
    pub fn new() -> Self {
        Self::with_params(1.2, 0.75)
    }

    pub fn with_params(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            ..Default::default()
        }
    }

    /// Tokenize text into lowercase terms, dropping single characters
    pub(crate) fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1)
            .map(String::from)
            .collect()
    }

    /// Add a document to the index; re-adding an id replaces it
    pub fn add_document(&mut self, id: &str, content: &str) {
        if self.documents.contains_key(id) {
            self.remove_document(id);
        }

        let tokens = Self::tokenize(content);
        let unique_terms: HashSet<_> = tokens.iter().cloned().collect();
        for term in unique_terms {
            *self.document_frequencies.entry(term.clone()).or_insert(0) += 1;
            self.inverted_index
                .entry(term)
                .or_default()
                .insert(id.to_string());
        }

        self.total_tokens += tokens.len();
        self.documents.insert(id.to_string(), tokens);
    }

    pub fn remove_document(&mut self, id: &str) {
        let Some(tokens) = self.documents.remove(id) else {
            return;
        };
        self.total_tokens -= tokens.len();

        let unique_terms: HashSet<_> = tokens.into_iter().collect();
        for term in unique_terms {
            if let Some(df) = self.document_frequencies.get_mut(&term) {
                *df = df.saturating_sub(1);
                if *df == 0 {
                    self.document_frequencies.remove(&term);
                }
            }
            if let Some(docs) = self.inverted_index.get_mut(&term) {
                docs.remove(id);
                if docs.is_empty() {
                    self.inverted_index.remove(&term);
                }
            }
        }
    }

    fn avg_doc_length(&self) -> f32 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_tokens as f32 / self.documents.len() as f32
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let df = self.document_frequencies.get(term).copied().unwrap_or(0) as f32;
        let n = self.documents.len() as f32;
        if df == 0.0 || n == 0.0 {
            return 0.0;
        }
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score_document(&self, doc_tokens: &[String], query_terms: &[String]) -> f32 {
        let doc_len = doc_tokens.len() as f32;
        let avg_len = self.avg_doc_length().max(f32::EPSILON);

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for token in doc_tokens {
            *term_freq.entry(token.as_str()).or_insert(0) += 1;
        }

        query_terms
            .iter()
            .map(|term| {
                let tf = term_freq.get(term.as_str()).copied().unwrap_or(0) as f32;
                let numerator = tf * (self.k1 + 1.0);
                let denominator = tf + self.k1 * (1.0 - self.b + self.b * doc_len / avg_len);
                self.idf(term) * numerator / denominator
            })
            .sum()
    }

    /// Top-k documents by score; equal scores are ordered by id
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let candidates: HashSet<&String> = query_terms
            .iter()
            .filter_map(|term| self.inverted_index.get(term))
            .flatten()
            .collect();

        let mut results: Vec<(String, f32)> = candidates
            .into_iter()
            .filter_map(|id| {
                let tokens = self.documents.get(id)?;
                let score = self.score_document(tokens, &query_terms);
                (score > 0.0).then(|| (id.clone(), score))
            })
            .collect();

        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(top_k);
        results
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bm25_basic() {
        let mut index = Bm25Index::new();
        index.add_document("doc1", "Apache Struts remote code execution vulnerability");
        index.add_document("doc2", "Phishing campaign targets finance teams");
        index.add_document("doc3", "Ransomware group leaks stolen data");

        let results = index.search("apache vulnerability", 10);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, "doc1");
    }

    #[test]
    fn test_bm25_ranking() {
        let mut index = Bm25Index::new();
        index.add_document("doc1", "malware malware malware");
        index.add_document("doc2", "malware botnet");
        index.add_document("doc3", "botnet botnet botnet");

        let results = index.search("malware", 10);
        assert_eq!(results[0].0, "doc1");
        assert!(results.iter().all(|(id, _)| id != "doc3"));
    }

    #[test]
    fn test_bm25_ties_sorted_by_id() {
        let mut index = Bm25Index::new();
        index.add_document("b", "zero day exploit");
        index.add_document("a", "zero day exploit");

        let ids: Vec<String> = index.search("exploit", 10).into_iter().map(|r| r.0).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_bm25_remove_and_replace() {
        let mut index = Bm25Index::new();
        index.add_document("doc1", "hello world");
        index.add_document("doc2", "goodbye world");
        assert_eq!(index.len(), 2);

        index.remove_document("doc1");
        assert_eq!(index.len(), 1);
        assert!(index.search("hello", 10).is_empty());

        index.add_document("doc2", "fresh content");
        assert_eq!(index.len(), 1);
        assert!(index.search("goodbye", 10).is_empty());
    }

    #[test]
    fn test_empty_query() {
        let mut index = Bm25Index::new();
        index.add_document("doc1", "content");
        assert!(index.search("a ? !", 5).is_empty());
        assert!(Bm25Index::new().search("content", 5).is_empty());
    }
}
