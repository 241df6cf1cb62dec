//! Context retrieval boundary
//!
//! A [`ContextStore`] answers a query with ranked text snippets. An empty
//! answer is valid; an error means the store could not be reached, and the
//! pipeline carries on without context.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

/// A ranked piece of context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub text: String,
    /// Relevance in `0.0..=1.0`, higher is better
    pub score: f32,
}

impl ContextSnippet {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Source of context snippets for a run
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Get the name of this store
    fn name(&self) -> &'static str;

    /// Return at most `top_k` snippets, best first
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ContextSnippet>>;
}

/// Context store over documents held in memory
///
/// Documents are ranked by the share of query terms they contain. Like a
/// nearest-neighbour index, it always returns up to `top_k` documents even
/// when nothing overlaps; ties keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContextStore {
    documents: Vec<String>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given documents
    pub fn with_documents<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            documents: documents.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a document
    pub fn add(&mut self, document: impl Into<String>) {
        self.documents.push(document.into());
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ContextSnippet>> {
        let query_terms = terms(query);

        let mut ranked: Vec<ContextSnippet> = self
            .documents
            .iter()
            .map(|doc| {
                let score = if query_terms.is_empty() {
                    0.0
                } else {
                    let doc_terms = terms(doc);
                    let hits = query_terms.intersection(&doc_terms).count();
                    hits as f32 / query_terms.len() as f32
                };
                ContextSnippet::new(doc.clone(), score)
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_k);

        debug!(query, top_k, returned = ranked.len(), "Retrieved context");
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryContextStore::new();
        assert!(store.retrieve("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ranks_by_overlap() {
        let store = InMemoryContextStore::with_documents([
            "Tests passed on main",
            "Build failed: missing ENV_VAR in deploy step",
            "Build succeeded",
        ]);

        let snippets = store.retrieve("build failed ENV_VAR", 2).await.unwrap();
        assert_eq!(snippets.len(), 2);
        assert!(snippets[0].text.contains("missing ENV_VAR"));
        assert_eq!(snippets[0].score, 1.0);
        assert!(snippets[0].score >= snippets[1].score);
    }

    #[tokio::test]
    async fn test_returns_documents_without_overlap() {
        let mut store = InMemoryContextStore::new();
        store.add("first");
        store.add("second");

        let snippets = store.retrieve("latest", 5).await.unwrap();
        let texts: Vec<_> = snippets.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(snippets.iter().all(|s| s.score == 0.0));
    }

    #[tokio::test]
    async fn test_respects_top_k() {
        let store = InMemoryContextStore::with_documents(["a", "b", "c"]);
        assert_eq!(store.retrieve("a", 1).await.unwrap().len(), 1);
        assert!(store.retrieve("a", 0).await.unwrap().is_empty());
    }
}
