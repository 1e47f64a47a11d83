//! Query command handler.

use clap::Args;
use passage_core::AppConfig;
use passage_retrieval::{Embedder, Retriever};
use std::sync::Arc;

/// Query the index for relevant passages
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// The natural-language query
    pub query: String,

    /// Number of passages to retrieve (default from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let index = super::open_existing_index(config)?;
        let embedder = Arc::new(Embedder::from_config(config)?);
        let retriever = Retriever::new(embedder, index, config.top_k, config.min_score);

        let k = self.top_k.unwrap_or(config.top_k);
        let results = retriever.retrieve(&self.query, k).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }

        if results.is_empty() {
            println!("No relevant passages found.");
            return Ok(());
        }

        for (rank, passage) in results.iter().enumerate() {
            println!(
                "{}. [{:.3}] {} (chunk {})",
                rank + 1,
                passage.score,
                passage.document_id,
                passage.chunk_index
            );
            if let Some(heading) = &passage.heading {
                println!("   Section: {}", heading);
            }
            println!("   {}", preview(&passage.text, 200));
            println!();
        }

        Ok(())
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text() {
        assert_eq!(preview("short text", 200), "short text");
    }

    #[test]
    fn test_preview_flattens_and_truncates() {
        let text = "line one\nline  two ".repeat(30);
        let p = preview(&text, 20);
        assert!(p.ends_with("..."));
        assert!(!p.contains('\n'));
        assert_eq!(p.chars().count(), 23);
    }
}
