//! Embedding layer: provider trait, implementations, and the batching
//! wrapper the pipeline consumes.

pub mod ollama;
pub mod provider;
pub mod trigram;

pub use provider::{create_provider, EmbeddingProvider};

use futures::stream::{self, StreamExt, TryStreamExt};
use passage_core::{AppConfig, PassageError, PassageResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Initial backoff before the first retry, doubled per attempt.
const INITIAL_BACKOFF_MS: u64 = 100;

/// How many provider batches may be in flight at once. Bounded so a large
/// document does not turn into one request per chunk against a rate-limited
/// provider.
const MAX_CONCURRENT_BATCHES: usize = 4;

/// Order-preserving batching and retry wrapper around an embedding provider.
///
/// Slices inputs into batches of `batch_size`, runs a bounded number of
/// batches concurrently, retries transient provider failures with
/// exponential backoff, and validates that the provider returned exactly one
/// vector of the right dimension per input. A partial batch is surfaced as a
/// permanent error rather than silently shrinking the output.
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_retries: u32,
}

impl Embedder {
    /// Wrap a provider with the given batching and retry parameters.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, max_retries: u32) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            max_retries,
        }
    }

    /// Build the configured provider and wrap it.
    pub fn from_config(config: &AppConfig) -> PassageResult<Self> {
        let provider = create_provider(config)?;
        Ok(Self::new(provider, config.batch_size, config.max_retries))
    }

    /// Embedding dimension of the underlying provider.
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Provider name of the underlying provider.
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Model identifier of the underlying provider.
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed a sequence of texts, one vector per input, order preserved.
    pub async fn embed(&self, texts: &[String]) -> PassageResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(
            "Embedding {} texts in batches of {} via {}/{}",
            texts.len(),
            self.batch_size,
            self.provider.provider_name(),
            self.provider.model_name()
        );

        // Collected into a Vec before streaming to give each future a
        // concrete lifetime; mapping lazily inside `stream::iter` trips
        // rustc's "implementation of `FnOnce` is not general enough" error
        // when the resulting future is spawned.
        let batch_futures: Vec<_> = texts
            .chunks(self.batch_size)
            .map(|batch| self.embed_batch_with_retries(batch))
            .collect();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(batch_futures)
            .buffered(MAX_CONCURRENT_BATCHES)
            .try_collect()
            .await?;

        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();

        let dim = self.provider.dimensions();
        for vector in &vectors {
            if vector.len() != dim {
                return Err(PassageError::DimensionMismatch {
                    expected: dim,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }

    /// Embed a single text (convenience for queries).
    pub async fn embed_one(&self, text: &str) -> PassageResult<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| PassageError::embedding_permanent("No embedding returned"))
    }

    async fn embed_batch_with_retries(&self, batch: &[String]) -> PassageResult<Vec<Vec<f32>>> {
        let mut attempt = 0u32;

        loop {
            match self.provider.embed_batch(batch).await {
                Ok(vectors) => {
                    if vectors.len() != batch.len() {
                        return Err(PassageError::embedding_permanent(format!(
                            "Provider returned {} vectors for a batch of {}",
                            vectors.len(),
                            batch.len()
                        )));
                    }
                    return Ok(vectors);
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff_ms = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                    warn!(
                        "Embedding batch failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, self.max_retries, backoff_ms, err
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
