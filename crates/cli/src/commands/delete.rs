//! Delete command handler.

use anyhow::Context;
use clap::Args;
use passage_core::AppConfig;

/// Remove a document from the index
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Document id to remove (as shown by 'passage query')
    pub document_id: String,
}

impl DeleteCommand {
    pub fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let index = super::open_existing_index(config)?;

        let removed = index.delete_document(&self.document_id)?;
        if removed == 0 {
            println!("No entries found for document '{}'", self.document_id);
            return Ok(());
        }

        index
            .persist(&config.index_path())
            .context("Failed to persist index")?;

        println!(
            "Removed {} entries for document '{}'",
            removed, self.document_id
        );
        Ok(())
    }
}
