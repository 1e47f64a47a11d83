//! SQLite persistence for the vector index.
//!
//! Layout: a `meta` key/value table (schema version, dimension, metric,
//! entry count), a `documents` table, and an `entries` table whose `seq`
//! column preserves insertion order and whose vectors are little-endian f32
//! BLOBs. Metadata and vectors are written in lockstep; loading verifies
//! counts and dimensions and fails with `CorruptIndex` on any disagreement.

use super::{create_metric, IndexState, VectorIndex};
use crate::types::{DocumentRecord, IndexEntry};
use chrono::{DateTime, Utc};
use passage_core::{PassageError, PassageResult};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;

const SCHEMA_VERSION: &str = "1";

/// Write a full snapshot of the index state to `path`.
///
/// The snapshot goes to a sibling temp file first and is renamed into place,
/// so a crash mid-write never leaves a truncated index behind.
pub(crate) fn persist_state(
    state: &IndexState,
    metric_name: &str,
    path: &Path,
) -> PassageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            PassageError::Index(format!("Failed to create index directory: {}", e))
        })?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| PassageError::Index(format!("Invalid index path: {:?}", path)))?
        .to_string_lossy()
        .to_string();
    let tmp_path = path.with_file_name(format!("{}.tmp", file_name));

    if tmp_path.exists() {
        std::fs::remove_file(&tmp_path)?;
    }

    {
        let mut conn = Connection::open(&tmp_path)
            .map_err(|e| PassageError::Index(format!("Failed to open index file: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE documents (
                id TEXT PRIMARY KEY,
                fingerprint TEXT,
                chunk_count INTEGER NOT NULL,
                ingested_at TEXT NOT NULL
            );

            CREATE TABLE entries (
                seq INTEGER PRIMARY KEY,
                id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                heading TEXT,
                embedding BLOB NOT NULL
            );
            "#,
        )
        .map_err(|e| PassageError::Index(format!("Failed to create index schema: {}", e)))?;

        let tx = conn
            .transaction()
            .map_err(|e| PassageError::Index(format!("Failed to start transaction: {}", e)))?;

        let meta = [
            ("schema_version", SCHEMA_VERSION.to_string()),
            ("metric", metric_name.to_string()),
            ("dimension", state.dimension.unwrap_or(0).to_string()),
            ("entry_count", state.entries.len().to_string()),
        ];
        for (key, value) in &meta {
            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| PassageError::Index(format!("Failed to write meta: {}", e)))?;
        }

        for (id, record) in &state.documents {
            tx.execute(
                "INSERT INTO documents (id, fingerprint, chunk_count, ingested_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    id,
                    record.fingerprint,
                    record.chunk_count as i64,
                    record.ingested_at.to_rfc3339(),
                ],
            )
            .map_err(|e| PassageError::Index(format!("Failed to write document: {}", e)))?;
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO entries
                     (seq, id, document_id, chunk_index, text, start_offset, end_offset, heading, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(|e| PassageError::Index(format!("Failed to prepare insert: {}", e)))?;

            for (seq, entry) in state.entries.iter().enumerate() {
                stmt.execute(params![
                    seq as i64,
                    entry.id,
                    entry.document_id,
                    entry.chunk_index as i64,
                    entry.text,
                    entry.start as i64,
                    entry.end as i64,
                    entry.heading,
                    vector_to_blob(&entry.vector),
                ])
                .map_err(|e| PassageError::Index(format!("Failed to write entry: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| PassageError::Index(format!("Failed to commit index: {}", e)))?;
    }

    std::fs::rename(&tmp_path, path)?;

    tracing::debug!(
        "Persisted {} entries, {} documents to {:?}",
        state.entries.len(),
        state.documents.len(),
        path
    );
    Ok(())
}

/// Restore a vector index from a persisted file.
///
/// The in-memory search structure is rebuilt entirely from the stored
/// vectors and metadata. Fails with `CorruptIndex` when the stored entry
/// count, a vector's byte length, or a vector's dimension is inconsistent.
pub fn load_index(path: &Path) -> PassageResult<VectorIndex> {
    if !path.exists() {
        return Err(PassageError::Index(format!(
            "No persisted index at {:?}",
            path
        )));
    }

    let conn = Connection::open(path)
        .map_err(|e| PassageError::CorruptIndex(format!("Failed to open index file: {}", e)))?;

    let meta = read_meta(&conn)?;

    let version = meta_value(&meta, "schema_version")?;
    if version != SCHEMA_VERSION {
        return Err(PassageError::CorruptIndex(format!(
            "Unsupported index schema version: {}",
            version
        )));
    }

    let metric_name = meta_value(&meta, "metric")?;
    let metric = create_metric(&metric_name)?;

    let dimension: usize = meta_value(&meta, "dimension")?
        .parse()
        .map_err(|_| PassageError::CorruptIndex("Invalid dimension in meta".to_string()))?;
    let entry_count: usize = meta_value(&meta, "entry_count")?
        .parse()
        .map_err(|_| PassageError::CorruptIndex("Invalid entry count in meta".to_string()))?;

    let documents = read_documents(&conn)?;
    let entries = read_entries(&conn, dimension)?;

    if entries.len() != entry_count {
        return Err(PassageError::CorruptIndex(format!(
            "Index meta claims {} entries but {} are stored",
            entry_count,
            entries.len()
        )));
    }

    let state = IndexState {
        dimension: if entries.is_empty() {
            None
        } else {
            Some(dimension)
        },
        entries,
        documents,
    };

    tracing::debug!(
        "Loaded {} entries, {} documents from {:?}",
        state.entries.len(),
        state.documents.len(),
        path
    );

    Ok(VectorIndex::from_state(metric, state))
}

fn read_meta(conn: &Connection) -> PassageResult<HashMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT key, value FROM meta")
        .map_err(|e| PassageError::CorruptIndex(format!("Missing meta table: {}", e)))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| PassageError::CorruptIndex(format!("Failed to read meta: {}", e)))?;

    let mut meta = HashMap::new();
    for row in rows {
        let (key, value) =
            row.map_err(|e| PassageError::CorruptIndex(format!("Failed to read meta: {}", e)))?;
        meta.insert(key, value);
    }
    Ok(meta)
}

fn meta_value(meta: &HashMap<String, String>, key: &str) -> PassageResult<String> {
    meta.get(key)
        .cloned()
        .ok_or_else(|| PassageError::CorruptIndex(format!("Missing meta key: {}", key)))
}

fn read_documents(conn: &Connection) -> PassageResult<HashMap<String, DocumentRecord>> {
    let mut stmt = conn
        .prepare("SELECT id, fingerprint, chunk_count, ingested_at FROM documents")
        .map_err(|e| PassageError::CorruptIndex(format!("Missing documents table: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(|e| PassageError::CorruptIndex(format!("Failed to read documents: {}", e)))?;

    let mut documents = HashMap::new();
    for row in rows {
        let (id, fingerprint, chunk_count, ingested_at) = row
            .map_err(|e| PassageError::CorruptIndex(format!("Failed to read documents: {}", e)))?;

        let ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
            .map_err(|e| {
                PassageError::CorruptIndex(format!("Invalid timestamp for '{}': {}", id, e))
            })?
            .with_timezone(&Utc);

        documents.insert(
            id,
            DocumentRecord {
                fingerprint,
                chunk_count: chunk_count as u32,
                ingested_at,
            },
        );
    }
    Ok(documents)
}

fn read_entries(conn: &Connection, dimension: usize) -> PassageResult<Vec<IndexEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, document_id, chunk_index, text, start_offset, end_offset, heading, embedding
             FROM entries ORDER BY seq",
        )
        .map_err(|e| PassageError::CorruptIndex(format!("Missing entries table: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Vec<u8>>(7)?,
            ))
        })
        .map_err(|e| PassageError::CorruptIndex(format!("Failed to read entries: {}", e)))?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, document_id, chunk_index, text, start, end, heading, blob) = row
            .map_err(|e| PassageError::CorruptIndex(format!("Failed to read entries: {}", e)))?;

        let vector = blob_to_vector(&blob)
            .map_err(|e| PassageError::CorruptIndex(format!("Entry '{}': {}", id, e)))?;

        if vector.len() != dimension {
            return Err(PassageError::CorruptIndex(format!(
                "Entry '{}' has dimension {} but index meta says {}",
                id,
                vector.len(),
                dimension
            )));
        }

        entries.push(IndexEntry {
            id,
            document_id,
            chunk_index: chunk_index as u32,
            text,
            start: start as usize,
            end: end as usize,
            heading,
            vector,
        });
    }
    Ok(entries)
}

/// Encode a vector as little-endian f32 bytes.
fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a vector.
fn blob_to_vector(bytes: &[u8]) -> Result<Vec<f32>, String> {
    if bytes.len() % 4 != 0 {
        return Err(format!("embedding blob length {} is not a multiple of 4", bytes.len()));
    }

    let mut vector = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        vector.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(vector)
}
