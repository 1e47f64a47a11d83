//! Retrieval pipeline type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bounded segment of a document's normalized text, the unit of embedding
/// and retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Owning document id
    pub document_id: String,

    /// Monotonic position within the document
    pub index: u32,

    /// Text content
    pub text: String,

    /// Byte offset of the chunk start in the normalized source text
    pub start: usize,

    /// Byte offset one past the chunk end in the normalized source text
    pub end: usize,

    /// Section heading covering this chunk, when one was detected
    pub heading: Option<String>,
}

impl Chunk {
    /// Stable entry identifier, derived from document id and position.
    pub fn entry_id(&self) -> String {
        format!("{}#{}", self.document_id, self.index)
    }
}

/// A chunk paired with its embedding, as stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Stable entry identifier (`{document_id}#{chunk_index}`)
    pub id: String,

    /// Owning document id
    pub document_id: String,

    /// Chunk position within the document
    pub chunk_index: u32,

    /// Text content
    pub text: String,

    /// Byte offsets into the normalized source text
    pub start: usize,
    pub end: usize,

    /// Detected section heading, if any
    pub heading: Option<String>,

    /// Embedding vector; fixed dimension across the whole index
    pub vector: Vec<f32>,
}

impl IndexEntry {
    /// Pair a chunk with its embedding.
    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.entry_id(),
            document_id: chunk.document_id,
            chunk_index: chunk.index,
            text: chunk.text,
            start: chunk.start,
            end: chunk.end,
            heading: chunk.heading,
            vector,
        }
    }
}

/// Per-document bookkeeping held by the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// SHA-256 hex fingerprint of the normalized text, when ingested
    /// through the pipeline. Plain inserts leave it unset.
    pub fingerprint: Option<String>,

    /// Number of entries currently stored for the document
    pub chunk_count: u32,

    /// When the document was last (re)ingested
    pub ingested_at: DateTime<Utc>,
}

/// One ranked retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    /// Source document id
    pub document_id: String,

    /// Chunk position within the source document
    pub chunk_index: u32,

    /// Passage text
    pub text: String,

    /// Byte offsets into the normalized source text
    pub start: usize,
    pub end: usize,

    /// Detected section heading, if any
    pub heading: Option<String>,

    /// Similarity score under the index's configured metric
    pub score: f32,
}

/// Outcome of a single document ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSummary {
    /// Document id that was ingested
    pub document_id: String,

    /// Number of chunks produced by the chunker
    pub chunks_created: u32,

    /// Number of vectors committed to the index
    pub vectors_stored: u32,

    /// True when the content fingerprint was unchanged and nothing was done
    pub skipped: bool,
}

/// Aggregate statistics for a vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of documents with at least one entry
    pub documents_count: u32,

    /// Total number of entries
    pub entries_count: u32,

    /// Established vector dimension, once the first entry is inserted
    pub dimension: Option<usize>,
}
