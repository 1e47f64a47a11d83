//! Embedding provider trait and factory.

use passage_core::{AppConfig, PassageError, PassageResult};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// A provider maps text to fixed-dimension vectors. It reports the model it
/// wraps and the dimension it produces; the [`crate::embed::Embedder`]
/// wrapper layers batching and retry on top.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Embedding dimension
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts, order-preserving, one vector
    /// per input string.
    async fn embed_batch(&self, texts: &[String]) -> PassageResult<Vec<Vec<f32>>>;
}

/// Create an embedding provider based on configuration.
pub fn create_provider(config: &AppConfig) -> PassageResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "trigram" => Ok(Arc::new(super::trigram::TrigramProvider::new(
            config.dimensions,
        ))),

        "ollama" => Ok(Arc::new(super::ollama::OllamaProvider::new(config)?)),

        other => Err(PassageError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let config = AppConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();

        let result = create_provider(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }
}
