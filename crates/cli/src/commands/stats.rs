//! Stats command handler.

use clap::Args;
use passage_core::AppConfig;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let index = super::open_existing_index(config)?;
        let stats = index.stats()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Index: {:?}", config.index_path());
        println!("Metric: {}", index.metric_name());
        println!("Documents: {}", stats.documents_count);
        println!("Entries: {}", stats.entries_count);
        match stats.dimension {
            Some(dimension) => println!("Dimension: {}", dimension),
            None => println!("Dimension: (not established)"),
        }

        Ok(())
    }
}
