//! Ingest command handler.
//!
//! Feeds extracted document text (plain `.txt` files, one per source
//! document) through the ingestion pipeline and persists the index.

use anyhow::Context;
use clap::Args;
use passage_core::AppConfig;
use passage_retrieval::{Embedder, IngestionPipeline, IngestionSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Ingest extracted text files into the index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories containing extracted document text
    pub paths: Vec<PathBuf>,

    /// Output the ingestion summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        if self.paths.is_empty() {
            anyhow::bail!("No paths given. Pass files or directories of extracted text.");
        }

        let index = super::open_or_create_index(config)?;
        let embedder = Arc::new(Embedder::from_config(config)?);
        let pipeline = IngestionPipeline::from_config(config, embedder, Arc::clone(&index));

        let mut summaries: Vec<IngestionSummary> = Vec::new();

        for path in &self.paths {
            if path.is_file() {
                summaries.push(ingest_file(&pipeline, config, path).await?);
            } else if path.is_dir() {
                for entry in WalkDir::new(path)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    let entry_path = entry.path();
                    if entry_path.is_file()
                        && entry_path.extension().is_some_and(|ext| ext == "txt")
                    {
                        summaries.push(ingest_file(&pipeline, config, entry_path).await?);
                    }
                }
            } else {
                anyhow::bail!("Path does not exist: {:?}", path);
            }
        }

        index
            .persist(&config.index_path())
            .context("Failed to persist index")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        } else {
            for summary in &summaries {
                if summary.skipped {
                    println!("{}: unchanged, skipped", summary.document_id);
                } else {
                    println!(
                        "{}: {} chunks embedded",
                        summary.document_id, summary.vectors_stored
                    );
                }
            }
            let ingested = summaries.iter().filter(|s| !s.skipped).count();
            println!(
                "Ingested {} of {} documents into {:?}",
                ingested,
                summaries.len(),
                config.index_path()
            );
        }

        Ok(())
    }
}

async fn ingest_file(
    pipeline: &IngestionPipeline,
    config: &AppConfig,
    path: &Path,
) -> anyhow::Result<IngestionSummary> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;

    let document_id = document_id_for(config, path);
    let summary = pipeline
        .ingest(&document_id, &text)
        .await
        .with_context(|| format!("Failed to ingest {:?}", path))?;

    Ok(summary)
}

/// Derive a stable document id from the file path: relative to the
/// workspace when possible, so the same tree ingested from different
/// working directories maps to the same ids.
fn document_id_for(config: &AppConfig, path: &Path) -> String {
    let relative = path.strip_prefix(&config.workspace).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}
