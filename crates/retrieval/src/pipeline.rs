//! Document ingestion: normalize, fingerprint, chunk, embed, commit.
//!
//! Commits are all-or-nothing per document: the index is only touched after
//! every chunk has an embedding, so an embedding failure (or cancellation of
//! the ingest future) leaves the index at its pre-ingestion state.

use crate::chunk;
use crate::embed::Embedder;
use crate::index::VectorIndex;
use crate::types::{IndexEntry, IngestionSummary};
use passage_core::{AppConfig, PassageError, PassageResult};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

/// SHA-256 hex fingerprint of normalized document text, used to detect
/// unchanged re-ingestion.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Coordinates Chunker → Embedder → VectorIndex for document ingestion.
#[derive(Debug)]
pub struct IngestionPipeline {
    embedder: Arc<Embedder>,
    index: Arc<VectorIndex>,
    max_length: usize,
    overlap: usize,
    in_flight: Mutex<HashSet<String>>,
}

impl IngestionPipeline {
    /// Create a pipeline with explicit chunking parameters.
    pub fn new(
        embedder: Arc<Embedder>,
        index: Arc<VectorIndex>,
        max_length: usize,
        overlap: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            max_length,
            overlap,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Create a pipeline with chunking parameters from configuration.
    pub fn from_config(config: &AppConfig, embedder: Arc<Embedder>, index: Arc<VectorIndex>) -> Self {
        Self::new(embedder, index, config.chunk_max_length, config.chunk_overlap)
    }

    /// Ingest one document.
    ///
    /// Re-ingesting unchanged content is a no-op (`skipped` is set on the
    /// summary); changed content atomically replaces the document's prior
    /// entries. A second concurrent ingestion of the same document id fails
    /// with `IngestionConflict`.
    #[instrument(skip(self, text), fields(document_id = %document_id, text_len = text.len()))]
    pub async fn ingest(&self, document_id: &str, text: &str) -> PassageResult<IngestionSummary> {
        let _guard = InFlightGuard::acquire(&self.in_flight, document_id)?;

        let normalized = chunk::normalize(text);
        let fingerprint = fingerprint(&normalized);

        if self.index.document_fingerprint(document_id)?.as_deref() == Some(&fingerprint) {
            info!("Document '{}' unchanged, skipping", document_id);
            return Ok(IngestionSummary {
                document_id: document_id.to_string(),
                chunks_created: 0,
                vectors_stored: 0,
                skipped: true,
            });
        }

        let chunks = chunk::chunk_text(document_id, &normalized, self.max_length, self.overlap);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        // Embed everything before touching the index so a mid-batch failure
        // cannot leave a partially-ingested document behind.
        let vectors = self.embedder.embed(&texts).await.map_err(|err| {
            tracing::error!(
                "Embedding failed for document '{}' ({} chunks): {}",
                document_id,
                texts.len(),
                err
            );
            err
        })?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry::from_chunk(chunk, vector))
            .collect();

        let count = entries.len() as u32;
        self.index
            .replace_document(document_id, &fingerprint, entries)?;

        info!("Ingested document '{}': {} chunks", document_id, count);
        Ok(IngestionSummary {
            document_id: document_id.to_string(),
            chunks_created: count,
            vectors_stored: count,
            skipped: false,
        })
    }
}

/// Marks a document id as in flight for the lifetime of an ingestion,
/// including early returns and cancellation of the ingest future.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    document_id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, document_id: &str) -> PassageResult<Self> {
        let mut in_flight = set
            .lock()
            .map_err(|_| PassageError::Index("in-flight lock poisoned".to_string()))?;

        if !in_flight.insert(document_id.to_string()) {
            return Err(PassageError::IngestionConflict {
                document_id: document_id.to_string(),
            });
        }

        Ok(Self {
            set,
            document_id: document_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.set.lock() {
            in_flight.remove(&self.document_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::trigram::TrigramProvider;

    fn pipeline(dimensions: usize) -> (IngestionPipeline, Arc<VectorIndex>) {
        let embedder = Arc::new(Embedder::new(
            Arc::new(TrigramProvider::new(dimensions)),
            16,
            0,
        ));
        let index = Arc::new(VectorIndex::with_metric_name("cosine").unwrap());
        (
            IngestionPipeline::new(embedder, Arc::clone(&index), 300, 50),
            index,
        )
    }

    #[test]
    fn test_fingerprint_stable_and_content_sensitive() {
        assert_eq!(fingerprint("hello"), fingerprint("hello"));
        assert_ne!(fingerprint("hello"), fingerprint("hello!"));
        assert_eq!(fingerprint("hello").len(), 64);
    }

    #[tokio::test]
    async fn test_ingest_creates_entries() {
        let (pipeline, index) = pipeline(64);
        let text = "Management controlling. ".repeat(40);

        let summary = pipeline.ingest("doc1", &text).await.unwrap();
        assert!(!summary.skipped);
        assert!(summary.chunks_created > 0);
        assert_eq!(summary.chunks_created, summary.vectors_stored);
        assert_eq!(index.len().unwrap(), summary.chunks_created as usize);
    }

    #[tokio::test]
    async fn test_reingest_unchanged_is_noop() {
        let (pipeline, index) = pipeline(64);
        let text = "Some document text. ".repeat(50);

        let first = pipeline.ingest("doc1", &text).await.unwrap();
        let count_after_first = index.len().unwrap();

        let second = pipeline.ingest("doc1", &text).await.unwrap();
        assert!(second.skipped);
        assert_eq!(second.vectors_stored, 0);
        assert_eq!(index.len().unwrap(), count_after_first);
        assert!(first.chunks_created > 0);
    }

    #[tokio::test]
    async fn test_reingest_changed_replaces_entries() {
        let (pipeline, index) = pipeline(64);

        let text1 = "Original content about budgets. ".repeat(30);
        pipeline.ingest("doc1", &text1).await.unwrap();

        let text2 = "Replacement content about forecasts. ".repeat(10);
        let summary = pipeline.ingest("doc1", &text2).await.unwrap();
        assert!(!summary.skipped);
        assert_eq!(index.len().unwrap(), summary.chunks_created as usize);

        // Nothing referencing the old text survives.
        let results = index
            .search(
                &pipeline.embedder.embed_one("budgets").await.unwrap(),
                usize::MAX,
            )
            .unwrap();
        assert!(results.iter().all(|r| r.text.contains("Replacement")));
    }

    #[tokio::test]
    async fn test_embedding_failure_commits_nothing() {
        #[derive(Debug)]
        struct FailingProvider;

        #[async_trait::async_trait]
        impl crate::embed::EmbeddingProvider for FailingProvider {
            fn provider_name(&self) -> &str {
                "failing"
            }
            fn model_name(&self) -> &str {
                "failing-v1"
            }
            fn dimensions(&self) -> usize {
                8
            }
            async fn embed_batch(&self, _texts: &[String]) -> PassageResult<Vec<Vec<f32>>> {
                Err(PassageError::embedding_permanent("provider down"))
            }
        }

        let embedder = Arc::new(Embedder::new(Arc::new(FailingProvider), 16, 0));
        let index = Arc::new(VectorIndex::with_metric_name("cosine").unwrap());
        let pipeline = IngestionPipeline::new(embedder, Arc::clone(&index), 100, 10);

        let result = pipeline.ingest("doc1", "some text to embed").await;
        assert!(result.is_err());
        assert!(index.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_empty_document() {
        let (pipeline, index) = pipeline(64);
        let summary = pipeline.ingest("empty", "").await.unwrap();
        assert_eq!(summary.chunks_created, 0);
        assert!(!summary.skipped);
        assert!(index.is_empty().unwrap());

        // Second ingestion of the same empty content is detected as
        // unchanged.
        let second = pipeline.ingest("empty", "").await.unwrap();
        assert!(second.skipped);
    }

    #[tokio::test]
    async fn test_concurrent_same_document_conflicts() {
        let (pipeline, _index) = pipeline(64);

        // Hold the in-flight slot manually to simulate a concurrent ingest.
        let guard = InFlightGuard::acquire(&pipeline.in_flight, "doc1").unwrap();

        let result = pipeline.ingest("doc1", "text").await;
        assert!(matches!(
            result,
            Err(PassageError::IngestionConflict { .. })
        ));
        drop(guard);

        // Once the first ingestion finishes, the document is ingestable.
        assert!(pipeline.ingest("doc1", "text").await.is_ok());
    }

    #[tokio::test]
    async fn test_chunk_order_preserved_end_to_end() {
        let (pipeline, index) = pipeline(64);
        let text = "Alpha section text here. ".repeat(60);
        pipeline.ingest("doc1", &text).await.unwrap();

        let results = index
            .search(
                &pipeline.embedder.embed_one("alpha section").await.unwrap(),
                usize::MAX,
            )
            .unwrap();

        let mut indices: Vec<u32> = results.iter().map(|r| r.chunk_index).collect();
        indices.sort_unstable();
        let expected: Vec<u32> = (0..indices.len() as u32).collect();
        assert_eq!(indices, expected);
    }
}
