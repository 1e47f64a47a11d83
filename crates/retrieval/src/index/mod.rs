//! In-memory vector index with exact nearest-neighbor search and durable
//! SQLite persistence.
//!
//! The entry list and document table are the source of truth and live behind
//! a single reader-writer lock: searches share the read lock, while inserts,
//! deletions, and document replacement take the write lock so a search never
//! observes a partially-applied batch. Persistence snapshots the state under
//! the read lock and writes through a temp file so readers of the on-disk
//! file always see a complete index.

mod persist;

pub use persist::load_index;

use crate::types::{DocumentRecord, IndexEntry, IndexStats, ScoredPassage};
use chrono::Utc;
use passage_core::{PassageError, PassageResult};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

/// Similarity scoring strategy between a query vector and a candidate.
///
/// Implementations must be symmetric in dimension handling: callers guarantee
/// both slices have the index's established dimension.
pub trait SimilarityMetric: Send + Sync + std::fmt::Debug {
    /// Metric name as used in configuration and the persisted index.
    fn name(&self) -> &str;

    /// Higher scores mean more similar.
    fn score(&self, query: &[f32], candidate: &[f32]) -> f32;
}

/// Cosine similarity.
#[derive(Debug)]
pub struct CosineSimilarity;

impl SimilarityMetric for CosineSimilarity {
    fn name(&self) -> &str {
        "cosine"
    }

    fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        let dot: f32 = query.iter().zip(candidate.iter()).map(|(x, y)| x * y).sum();
        let norm_q: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_c: f32 = candidate.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_q == 0.0 || norm_c == 0.0 {
            return 0.0;
        }

        dot / (norm_q * norm_c)
    }
}

/// Inner product. Equivalent to cosine when vectors are pre-normalized,
/// without paying for the norms on every comparison.
#[derive(Debug)]
pub struct DotProduct;

impl SimilarityMetric for DotProduct {
    fn name(&self) -> &str {
        "dot"
    }

    fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        query.iter().zip(candidate.iter()).map(|(x, y)| x * y).sum()
    }
}

/// Create a similarity metric by configuration name.
pub fn create_metric(name: &str) -> PassageResult<Box<dyn SimilarityMetric>> {
    match name {
        "cosine" => Ok(Box::new(CosineSimilarity)),
        "dot" => Ok(Box::new(DotProduct)),
        other => Err(PassageError::Config(format!(
            "Unknown similarity metric: '{}'. Supported metrics: cosine, dot",
            other
        ))),
    }
}

/// The lock-guarded interior: entries in insertion order plus per-document
/// bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct IndexState {
    pub(crate) dimension: Option<usize>,
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) documents: HashMap<String, DocumentRecord>,
}

/// Durable store mapping embeddings to source metadata, supporting exact
/// top-k nearest-neighbor search.
#[derive(Debug)]
pub struct VectorIndex {
    metric: Box<dyn SimilarityMetric>,
    state: RwLock<IndexState>,
    // Serializes persist() calls (single-writer discipline on the file).
    persist_lock: Mutex<()>,
}

impl VectorIndex {
    /// Create an empty index with the given metric.
    pub fn new(metric: Box<dyn SimilarityMetric>) -> Self {
        Self {
            metric,
            state: RwLock::new(IndexState::default()),
            persist_lock: Mutex::new(()),
        }
    }

    /// Create an empty index from a metric name ("cosine", "dot").
    pub fn with_metric_name(name: &str) -> PassageResult<Self> {
        Ok(Self::new(create_metric(name)?))
    }

    pub(crate) fn from_state(metric: Box<dyn SimilarityMetric>, state: IndexState) -> Self {
        Self {
            metric,
            state: RwLock::new(state),
            persist_lock: Mutex::new(()),
        }
    }

    /// Name of the configured similarity metric.
    pub fn metric_name(&self) -> &str {
        self.metric.name()
    }

    /// Append a batch of entries.
    ///
    /// Every vector is validated against the established dimension before
    /// any mutation, so a failed insert leaves the index unchanged. The
    /// whole batch becomes visible to searches at once.
    pub fn insert(&self, entries: Vec<IndexEntry>) -> PassageResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut state = self.write_state()?;
        state.dimension = check_dimensions(state.dimension, &entries)?;

        for entry in &entries {
            let record = state
                .documents
                .entry(entry.document_id.clone())
                .or_insert_with(|| DocumentRecord {
                    fingerprint: None,
                    chunk_count: 0,
                    ingested_at: Utc::now(),
                });
            record.chunk_count += 1;
        }

        let added = entries.len();
        state.entries.extend(entries);

        tracing::debug!("Inserted {} entries ({} total)", added, state.entries.len());
        Ok(())
    }

    /// Exact top-k search under the configured metric.
    ///
    /// Results are ordered by descending score; ties favor earlier insertion
    /// so rankings are reproducible.
    pub fn search(&self, query: &[f32], k: usize) -> PassageResult<Vec<ScoredPassage>> {
        let state = self.read_state()?;

        if state.entries.is_empty() {
            return Err(PassageError::EmptyIndex);
        }

        let dimension = state.dimension.unwrap_or(0);
        if query.len() != dimension {
            return Err(PassageError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = state
            .entries
            .iter()
            .enumerate()
            .map(|(seq, entry)| (seq, self.metric.score(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        let results = scored
            .into_iter()
            .map(|(seq, score)| {
                let entry = &state.entries[seq];
                ScoredPassage {
                    document_id: entry.document_id.clone(),
                    chunk_index: entry.chunk_index,
                    text: entry.text.clone(),
                    start: entry.start,
                    end: entry.end,
                    heading: entry.heading.clone(),
                    score,
                }
            })
            .collect();

        Ok(results)
    }

    /// Remove all entries for a document. Returns the number removed.
    pub fn delete_document(&self, document_id: &str) -> PassageResult<u32> {
        let mut state = self.write_state()?;

        let before = state.entries.len();
        state.entries.retain(|e| e.document_id != document_id);
        let removed = (before - state.entries.len()) as u32;
        state.documents.remove(document_id);

        if state.entries.is_empty() {
            state.dimension = None;
        }

        tracing::debug!("Deleted {} entries for document '{}'", removed, document_id);
        Ok(removed)
    }

    /// Atomically replace a document's entries and record its fingerprint.
    ///
    /// New entries are appended before the old ones are dropped, inside a
    /// single write-lock critical section, so concurrent searches see either
    /// the old version or the new one and there is no window without
    /// coverage.
    pub fn replace_document(
        &self,
        document_id: &str,
        fingerprint: &str,
        entries: Vec<IndexEntry>,
    ) -> PassageResult<()> {
        let mut state = self.write_state()?;
        state.dimension = check_dimensions(state.dimension, &entries)?;

        let chunk_count = entries.len() as u32;
        let boundary = state.entries.len();
        state.entries.extend(entries);

        // Drop the pre-existing entries for this document (everything before
        // the append boundary).
        let mut seq = 0usize;
        state.entries.retain(|entry| {
            let stale = seq < boundary && entry.document_id == document_id;
            seq += 1;
            !stale
        });

        state.documents.insert(
            document_id.to_string(),
            DocumentRecord {
                fingerprint: Some(fingerprint.to_string()),
                chunk_count,
                ingested_at: Utc::now(),
            },
        );

        if state.entries.is_empty() {
            state.dimension = None;
        }

        tracing::debug!(
            "Replaced document '{}' with {} entries",
            document_id,
            chunk_count
        );
        Ok(())
    }

    /// The stored content fingerprint for a document, if the document was
    /// ingested with one.
    pub fn document_fingerprint(&self, document_id: &str) -> PassageResult<Option<String>> {
        let state = self.read_state()?;
        Ok(state
            .documents
            .get(document_id)
            .and_then(|record| record.fingerprint.clone()))
    }

    /// Established vector dimension, if any entry has been inserted.
    pub fn dimension(&self) -> PassageResult<Option<usize>> {
        Ok(self.read_state()?.dimension)
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> PassageResult<bool> {
        Ok(self.read_state()?.entries.is_empty())
    }

    /// Number of entries.
    pub fn len(&self) -> PassageResult<usize> {
        Ok(self.read_state()?.entries.len())
    }

    /// Aggregate statistics.
    pub fn stats(&self) -> PassageResult<IndexStats> {
        let state = self.read_state()?;
        Ok(IndexStats {
            documents_count: state.documents.len() as u32,
            entries_count: state.entries.len() as u32,
            dimension: state.dimension,
        })
    }

    /// Serialize the full index to `path`.
    ///
    /// The snapshot is taken under the read lock and written to a temp file
    /// that is renamed into place, so the persisted file is always a
    /// complete, consistent index.
    pub fn persist(&self, path: &Path) -> PassageResult<()> {
        let _writer = self
            .persist_lock
            .lock()
            .map_err(|_| PassageError::Index("persist lock poisoned".to_string()))?;

        let state = self.read_state()?;
        persist::persist_state(&state, self.metric.name(), path)
    }

    fn read_state(&self) -> PassageResult<std::sync::RwLockReadGuard<'_, IndexState>> {
        self.state
            .read()
            .map_err(|_| PassageError::Index("index lock poisoned".to_string()))
    }

    fn write_state(&self) -> PassageResult<std::sync::RwLockWriteGuard<'_, IndexState>> {
        self.state
            .write()
            .map_err(|_| PassageError::Index("index lock poisoned".to_string()))
    }
}

/// Validate a batch against the established dimension, returning the
/// dimension the index should record.
fn check_dimensions(
    established: Option<usize>,
    entries: &[IndexEntry],
) -> PassageResult<Option<usize>> {
    let mut dimension = established;

    for entry in entries {
        match dimension {
            None => dimension = Some(entry.vector.len()),
            Some(expected) if entry.vector.len() != expected => {
                return Err(PassageError::DimensionMismatch {
                    expected,
                    actual: entry.vector.len(),
                });
            }
            _ => {}
        }
    }

    Ok(dimension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(document_id: &str, chunk_index: u32, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: format!("{}#{}", document_id, chunk_index),
            document_id: document_id.to_string(),
            chunk_index,
            text: format!("chunk {} of {}", chunk_index, document_id),
            start: 0,
            end: 0,
            heading: None,
            vector,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let metric = CosineSimilarity;
        assert!((metric.score(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(metric.score(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert_eq!(metric.score(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_dot_product() {
        let metric = DotProduct;
        assert!((metric.score(&[0.5, 0.5], &[1.0, 1.0]) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_create_metric_unknown() {
        assert!(create_metric("euclidean").is_err());
    }

    #[test]
    fn test_search_exact_ranking() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        index
            .insert(vec![
                entry("doc", 0, vec![1.0, 0.0, 0.0]),
                entry("doc", 1, vec![0.0, 1.0, 0.0]),
                entry("doc", 2, vec![0.7, 0.7, 0.0]),
            ])
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 0);
        assert_eq!(results[1].chunk_index, 2);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_search_tie_break_favors_earlier_insertion() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        index
            .insert(vec![
                entry("b", 0, vec![1.0, 0.0]),
                entry("a", 0, vec![1.0, 0.0]),
                entry("c", 0, vec![1.0, 0.0]),
            ])
            .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let order: Vec<&str> = results.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        let result = index.search(&[1.0, 0.0], 5);
        assert!(matches!(result, Err(PassageError::EmptyIndex)));
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        index.insert(vec![entry("doc", 0, vec![1.0, 0.0])]).unwrap();

        let results = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        index.insert(vec![entry("doc", 0, vec![1.0, 0.0])]).unwrap();

        let result = index.search(&[1.0, 0.0, 0.0], 5);
        assert!(matches!(
            result,
            Err(PassageError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_insert_dimension_mismatch_leaves_index_unchanged() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        index.insert(vec![entry("doc", 0, vec![1.0, 0.0])]).unwrap();

        let result = index.insert(vec![
            entry("other", 0, vec![0.0, 1.0]),
            entry("other", 1, vec![0.0, 1.0, 2.0]),
        ]);
        assert!(matches!(
            result,
            Err(PassageError::DimensionMismatch { .. })
        ));

        // The valid first entry of the failed batch must not have landed.
        assert_eq!(index.len().unwrap(), 1);
        let stats = index.stats().unwrap();
        assert_eq!(stats.documents_count, 1);
    }

    #[test]
    fn test_delete_document() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        index
            .insert(vec![
                entry("keep", 0, vec![1.0, 0.0]),
                entry("drop", 0, vec![0.0, 1.0]),
                entry("drop", 1, vec![0.5, 0.5]),
            ])
            .unwrap();

        let removed = index.delete_document("drop").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.len().unwrap(), 1);

        let results = index.search(&[0.0, 1.0], 10).unwrap();
        assert!(results.iter().all(|r| r.document_id == "keep"));
    }

    #[test]
    fn test_delete_last_document_resets_dimension() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        index.insert(vec![entry("doc", 0, vec![1.0, 0.0])]).unwrap();
        index.delete_document("doc").unwrap();

        assert_eq!(index.dimension().unwrap(), None);
        // A new dimension can now be established.
        index
            .insert(vec![entry("doc2", 0, vec![1.0, 0.0, 0.0])])
            .unwrap();
        assert_eq!(index.dimension().unwrap(), Some(3));
    }

    #[test]
    fn test_replace_document() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        index
            .replace_document(
                "doc",
                "fp1",
                vec![entry("doc", 0, vec![1.0, 0.0]), entry("doc", 1, vec![0.0, 1.0])],
            )
            .unwrap();
        index
            .insert(vec![entry("other", 0, vec![0.5, 0.5])])
            .unwrap();

        index
            .replace_document("doc", "fp2", vec![entry("doc", 0, vec![0.9, 0.1])])
            .unwrap();

        assert_eq!(index.len().unwrap(), 2);
        assert_eq!(
            index.document_fingerprint("doc").unwrap(),
            Some("fp2".to_string())
        );

        // No stale entries from the first version survive.
        let results = index.search(&[0.0, 1.0], 10).unwrap();
        let doc_hits: Vec<_> = results.iter().filter(|r| r.document_id == "doc").collect();
        assert_eq!(doc_hits.len(), 1);
        assert_eq!(doc_hits[0].chunk_index, 0);
    }

    #[test]
    fn test_replace_document_dimension_mismatch_is_fatal() {
        let index = VectorIndex::with_metric_name("cosine").unwrap();
        index.insert(vec![entry("doc", 0, vec![1.0, 0.0])]).unwrap();

        let result =
            index.replace_document("doc", "fp", vec![entry("doc", 0, vec![1.0, 0.0, 0.0])]);
        assert!(matches!(
            result,
            Err(PassageError::DimensionMismatch { .. })
        ));
        // Old content is still searchable.
        assert_eq!(index.len().unwrap(), 1);
    }

    #[test]
    fn test_stats() {
        let index = VectorIndex::with_metric_name("dot").unwrap();
        index
            .insert(vec![
                entry("a", 0, vec![1.0, 0.0]),
                entry("a", 1, vec![0.0, 1.0]),
                entry("b", 0, vec![0.5, 0.5]),
            ])
            .unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.documents_count, 2);
        assert_eq!(stats.entries_count, 3);
        assert_eq!(stats.dimension, Some(2));
    }

    #[test]
    fn test_concurrent_search_during_insert() {
        use std::sync::Arc;

        let index = Arc::new(VectorIndex::with_metric_name("cosine").unwrap());
        index.insert(vec![entry("seed", 0, vec![1.0, 0.0])]).unwrap();

        let writer = {
            let index = Arc::clone(&index);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let batch = vec![entry("w", i * 2, vec![1.0, 0.0]), entry("w", i * 2 + 1, vec![0.0, 1.0])];
                    index.insert(batch).unwrap();
                }
            })
        };

        // Searches must always observe whole batches: entry counts for the
        // writer's document are even at every observable point.
        for _ in 0..50 {
            let results = index.search(&[1.0, 0.0], usize::MAX).unwrap();
            let w_count = results.iter().filter(|r| r.document_id == "w").count();
            assert_eq!(w_count % 2, 0, "observed a partially-inserted batch");
        }

        writer.join().unwrap();
        assert_eq!(index.len().unwrap(), 101);
    }
}
