//! Ollama embedding provider.
//!
//! Talks to Ollama's local HTTP API (`/api/embeddings`) with models like
//! nomic-embed-text. Ollama has no batch endpoint, so batches are embedded
//! request-by-request; the [`crate::embed::Embedder`] wrapper owns retry
//! policy, so failures here are classified (transient vs permanent) but not
//! retried.

use crate::embed::provider::EmbeddingProvider;
use passage_core::{AppConfig, PassageError, PassageResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Ollama embedding provider using the local API.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider. The base URL comes from `OLLAMA_URL`
    /// when set; the request timeout comes from the configuration.
    pub fn new(config: &AppConfig) -> PassageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                PassageError::Config(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    async fn embed_single(&self, text: &str) -> PassageResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);

        let request = EmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                // Timeouts and connection drops are worth retrying.
                if e.is_timeout() || e.is_connect() {
                    PassageError::embedding_transient(format!(
                        "Ollama request to {} failed: {}",
                        url, e
                    ))
                } else {
                    PassageError::embedding_permanent(format!(
                        "Ollama request to {} failed: {}",
                        url, e
                    ))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => format!("Ollama API error ({}): {}", status, err.error),
                Err(_) => format!("Ollama API error ({}): {}", status, body),
            };

            // Rate limiting and server-side failures are transient; client
            // errors (bad model name, auth) are not.
            return if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Err(PassageError::embedding_transient(message))
            } else {
                Err(PassageError::embedding_permanent(message))
            };
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            PassageError::embedding_permanent(format!("Failed to parse Ollama response: {}", e))
        })?;

        if body.embedding.len() != self.dimensions {
            return Err(PassageError::embedding_permanent(format!(
                "Ollama model '{}' returned {} dimensions, expected {}",
                self.model,
                body.embedding.len(),
                self.dimensions
            )));
        }

        Ok(body.embedding)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> PassageResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Embedding batch of {} texts via Ollama", texts.len());

        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_single(text).await?);
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_metadata_from_config() {
        let mut config = AppConfig::default();
        config.provider = "ollama".to_string();
        config.model = "nomic-embed-text".to_string();
        config.dimensions = 768;

        let provider = OllamaProvider::new(&config).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
        assert_eq!(provider.dimensions(), 768);
    }

    #[tokio::test]
    async fn test_empty_batch_requires_no_server() {
        let provider = OllamaProvider::new(&AppConfig::default()).unwrap();
        let embeddings = provider.embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Point at a port nothing listens on; connection refusal must be
        // classified as retryable.
        std::env::set_var("OLLAMA_URL", "http://127.0.0.1:1");
        let provider = OllamaProvider::new(&AppConfig::default()).unwrap();
        std::env::remove_var("OLLAMA_URL");

        let result = provider.embed_batch(&["text".to_string()]).await;
        match result {
            Err(err) => assert!(err.is_transient(), "expected transient error, got {}", err),
            Ok(_) => panic!("expected connection failure"),
        }
    }
}
