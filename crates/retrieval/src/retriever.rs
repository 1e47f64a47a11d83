//! Query-side orchestration: embed the query, search the index, rank
//! passages.

use crate::embed::Embedder;
use crate::index::VectorIndex;
use crate::types::ScoredPassage;
use passage_core::{PassageError, PassageResult};
use std::sync::Arc;

/// Retrieves the top-k passages for a natural-language query.
///
/// The query is embedded in the same space as the indexed chunks; a query
/// vector whose dimension disagrees with the index is rejected rather than
/// coerced. Querying before anything was ingested fails with `EmptyIndex`
/// so callers can tell "no index" apart from "no relevant matches".
#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: Arc<Embedder>,
    index: Arc<VectorIndex>,
    default_top_k: usize,
    min_score: Option<f32>,
}

impl Retriever {
    /// Create a retriever over an embedder and index.
    pub fn new(
        embedder: Arc<Embedder>,
        index: Arc<VectorIndex>,
        default_top_k: usize,
        min_score: Option<f32>,
    ) -> Self {
        Self {
            embedder,
            index,
            default_top_k,
            min_score,
        }
    }

    /// Retrieve up to `k` passages ranked by similarity to `query_text`.
    pub async fn retrieve(&self, query_text: &str, k: usize) -> PassageResult<Vec<ScoredPassage>> {
        if self.index.is_empty()? {
            return Err(PassageError::EmptyIndex);
        }

        if let Some(dimension) = self.index.dimension()? {
            if self.embedder.dimensions() != dimension {
                // A different embedding model was configured after ingestion;
                // the corpus must be re-embedded explicitly.
                return Err(PassageError::DimensionMismatch {
                    expected: dimension,
                    actual: self.embedder.dimensions(),
                });
            }
        }

        let query_vector = self.embedder.embed_one(query_text).await?;
        let mut results = self.index.search(&query_vector, k)?;

        if let Some(min_score) = self.min_score {
            results.retain(|passage| passage.score >= min_score);
        }

        if results.is_empty() {
            tracing::info!("No relevant passages for query (min_score: {:?})", self.min_score);
        } else {
            tracing::debug!(
                "Retrieved {} passages (top score: {:.3}, lowest: {:.3})",
                results.len(),
                results.first().map(|p| p.score).unwrap_or(0.0),
                results.last().map(|p| p.score).unwrap_or(0.0)
            );
        }

        Ok(results)
    }

    /// Retrieve with the configured default `k`.
    pub async fn retrieve_default(&self, query_text: &str) -> PassageResult<Vec<ScoredPassage>> {
        self.retrieve(query_text, self.default_top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::trigram::TrigramProvider;
    use crate::types::IndexEntry;

    fn embedder(dimensions: usize) -> Arc<Embedder> {
        Arc::new(Embedder::new(
            Arc::new(TrigramProvider::new(dimensions)),
            16,
            0,
        ))
    }

    async fn entry_for(
        embedder: &Embedder,
        document_id: &str,
        chunk_index: u32,
        text: &str,
    ) -> IndexEntry {
        let vector = embedder.embed_one(text).await.unwrap();
        IndexEntry {
            id: format!("{}#{}", document_id, chunk_index),
            document_id: document_id.to_string(),
            chunk_index,
            text: text.to_string(),
            start: 0,
            end: text.len(),
            heading: None,
            vector,
        }
    }

    #[tokio::test]
    async fn test_empty_index_is_an_error() {
        let index = Arc::new(VectorIndex::with_metric_name("cosine").unwrap());
        let retriever = Retriever::new(embedder(64), index, 5, None);

        let result = retriever.retrieve("anything", 5).await;
        assert!(matches!(result, Err(PassageError::EmptyIndex)));
    }

    #[tokio::test]
    async fn test_retrieve_ranks_matching_text_first() {
        let embedder = embedder(384);
        let index = Arc::new(VectorIndex::with_metric_name("cosine").unwrap());

        index
            .insert(vec![
                entry_for(&embedder, "doc", 0, "controlling budgets and management oversight").await,
                entry_for(&embedder, "doc", 1, "photosynthesis in tropical plants").await,
            ])
            .unwrap();

        let retriever = Retriever::new(embedder, index, 5, None);
        let results = retriever
            .retrieve("what is management controlling", 2)
            .await
            .unwrap();

        assert_eq!(results[0].chunk_index, 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_after_model_change() {
        let index = Arc::new(VectorIndex::with_metric_name("cosine").unwrap());
        let ingest_embedder = embedder(64);
        index
            .insert(vec![entry_for(&ingest_embedder, "doc", 0, "some text").await])
            .unwrap();

        // Query with a differently-dimensioned model.
        let retriever = Retriever::new(embedder(128), index, 5, None);
        let result = retriever.retrieve("query", 5).await;
        assert!(matches!(
            result,
            Err(PassageError::DimensionMismatch {
                expected: 64,
                actual: 128
            })
        ));
    }

    #[tokio::test]
    async fn test_min_score_floor() {
        let embedder = embedder(384);
        let index = Arc::new(VectorIndex::with_metric_name("cosine").unwrap());
        index
            .insert(vec![
                entry_for(&embedder, "doc", 0, "completely unrelated gibberish zxqwv").await,
            ])
            .unwrap();

        let retriever = Retriever::new(embedder, index, 5, Some(0.99));
        let results = retriever
            .retrieve("management controlling functions", 5)
            .await
            .unwrap();

        // The floor filters weak matches but the call itself succeeds:
        // "no relevant results" is not an error.
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_default_uses_configured_k() {
        let embedder = embedder(384);
        let index = Arc::new(VectorIndex::with_metric_name("cosine").unwrap());
        let mut entries = Vec::new();
        for i in 0..10 {
            entries.push(entry_for(&embedder, "doc", i, &format!("passage number {}", i)).await);
        }
        index.insert(entries).unwrap();

        let retriever = Retriever::new(embedder, index, 3, None);
        let results = retriever.retrieve_default("passage").await.unwrap();
        assert_eq!(results.len(), 3);
    }
}
