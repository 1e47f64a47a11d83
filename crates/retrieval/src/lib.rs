//! Document-to-vector retrieval pipeline.
//!
//! Turns extracted document text into searchable vector representations:
//! deterministic chunking, pluggable embedding providers, an exact
//! nearest-neighbor vector index with durable persistence, and query-side
//! retrieval with stable ranking. PDF extraction and answer synthesis are
//! external collaborators; this crate owns everything between plain text in
//! and ranked passages out.

pub mod chunk;
pub mod embed;
pub mod index;
pub mod pipeline;
pub mod retriever;
pub mod types;

// Re-export commonly used types
pub use embed::{create_provider, Embedder, EmbeddingProvider};
pub use index::{create_metric, load_index, SimilarityMetric, VectorIndex};
pub use pipeline::IngestionPipeline;
pub use retriever::Retriever;
pub use types::{Chunk, IndexEntry, IndexStats, IngestionSummary, ScoredPassage};
