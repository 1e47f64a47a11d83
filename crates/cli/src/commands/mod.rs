//! Command handlers for the passage CLI.

mod delete;
mod ingest;
mod query;
mod stats;

pub use delete::DeleteCommand;
pub use ingest::IngestCommand;
pub use query::QueryCommand;
pub use stats::StatsCommand;

use passage_core::AppConfig;
use passage_retrieval::{load_index, VectorIndex};
use std::sync::Arc;

/// Open the workspace index, or start a fresh one when none has been
/// persisted yet.
pub(crate) fn open_or_create_index(config: &AppConfig) -> anyhow::Result<Arc<VectorIndex>> {
    let path = config.index_path();
    let index = if path.exists() {
        load_index(&path)?
    } else {
        VectorIndex::with_metric_name(&config.metric)?
    };
    Ok(Arc::new(index))
}

/// Open the workspace index, failing when none exists.
pub(crate) fn open_existing_index(config: &AppConfig) -> anyhow::Result<Arc<VectorIndex>> {
    let path = config.index_path();
    if !path.exists() {
        anyhow::bail!(
            "No index at {:?}. Run 'passage ingest' first.",
            path
        );
    }
    Ok(Arc::new(load_index(&path)?))
}
