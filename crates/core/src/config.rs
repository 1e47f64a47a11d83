//! Configuration management for the passage pipeline.
//!
//! Configuration is merged from multiple sources, later sources winning:
//! - Built-in defaults
//! - Config file (`.passage/config.yaml` under the workspace)
//! - Environment variables (`PASSAGE_*`, `RUST_LOG`, `NO_COLOR`)
//! - Command-line flags (applied via [`AppConfig::with_overrides`])
//!
//! State (the persisted index, config) lives under `.passage/` in the
//! workspace directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PassageError, PassageResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .passage/)
    pub workspace: PathBuf,

    /// Optional config file path override
    pub config_file: Option<PathBuf>,

    /// Embedding provider name (e.g., "trigram", "ollama")
    pub provider: String,

    /// Embedding model identifier
    pub model: String,

    /// Embedding vector dimension
    pub dimensions: usize,

    /// Maximum chunk length in bytes of normalized text
    pub chunk_max_length: usize,

    /// Overlap between consecutive chunks (must be < chunk_max_length)
    pub chunk_overlap: usize,

    /// Similarity metric: "cosine" or "dot"
    pub metric: String,

    /// Default number of passages to retrieve
    pub top_k: usize,

    /// Minimum similarity score for a passage to be returned (None = no floor)
    pub min_score: Option<f32>,

    /// Maximum texts per embedding provider request
    pub batch_size: usize,

    /// Timeout for a single provider request, in seconds
    pub request_timeout_secs: u64,

    /// Maximum retry attempts for transient provider failures
    pub max_retries: u32,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Config file structure (`.passage/config.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    embedding: Option<EmbeddingSection>,
    chunking: Option<ChunkingSection>,
    retrieval: Option<RetrievalSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EmbeddingSection {
    provider: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
    batch_size: Option<usize>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ChunkingSection {
    max_length: Option<usize>,
    overlap: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RetrievalSection {
    metric: Option<String>,
    top_k: Option<usize>,
    min_score: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "trigram".to_string(), // Local-first default
            model: "trigram-v1".to_string(),
            dimensions: 384,
            chunk_max_length: 512,
            chunk_overlap: 64,
            metric: "cosine".to_string(),
            top_k: 5,
            min_score: None,
            batch_size: 32,
            request_timeout_secs: 30,
            max_retries: 3,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Environment variables:
    /// - `PASSAGE_WORKSPACE`: Override workspace path
    /// - `PASSAGE_CONFIG`: Path to config file
    /// - `PASSAGE_PROVIDER`: Embedding provider
    /// - `PASSAGE_MODEL`: Embedding model identifier
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> PassageResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("PASSAGE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("PASSAGE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(PassageError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".passage/config.yaml")
        };

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
            tracing::debug!("Merged config file {:?}", config_path);
        }

        // Environment variables override the YAML config
        if let Ok(provider) = std::env::var("PASSAGE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("PASSAGE_MODEL") {
            config.model = model;
        }

        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> PassageResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PassageError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            PassageError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(embedding) = config_file.embedding {
            if let Some(provider) = embedding.provider {
                self.provider = provider;
            }
            if let Some(model) = embedding.model {
                self.model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                self.dimensions = dimensions;
            }
            if let Some(batch_size) = embedding.batch_size {
                self.batch_size = batch_size;
            }
            if let Some(timeout) = embedding.timeout_secs {
                self.request_timeout_secs = timeout;
            }
            if let Some(retries) = embedding.max_retries {
                self.max_retries = retries;
            }
        }

        if let Some(chunking) = config_file.chunking {
            if let Some(max_length) = chunking.max_length {
                self.chunk_max_length = max_length;
            }
            if let Some(overlap) = chunking.overlap {
                self.chunk_overlap = overlap;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            if let Some(metric) = retrieval.metric {
                self.metric = metric;
            }
            if let Some(top_k) = retrieval.top_k {
                self.top_k = top_k;
            }
            if retrieval.min_score.is_some() {
                self.min_score = retrieval.min_score;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        Ok(())
    }

    /// Apply CLI overrides, giving flags precedence over file and env.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Validate cross-field invariants.
    pub fn validate(&self) -> PassageResult<()> {
        if self.chunk_overlap >= self.chunk_max_length {
            return Err(PassageError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_max_length ({})",
                self.chunk_overlap, self.chunk_max_length
            )));
        }

        if self.dimensions == 0 {
            return Err(PassageError::Config(
                "embedding dimensions must be non-zero".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(PassageError::Config(
                "batch_size must be non-zero".to_string(),
            ));
        }

        let known_metrics = ["cosine", "dot"];
        if !known_metrics.contains(&self.metric.as_str()) {
            return Err(PassageError::Config(format!(
                "Unknown similarity metric: {}. Supported: {}",
                self.metric,
                known_metrics.join(", ")
            )));
        }

        Ok(())
    }

    /// Get the path to the .passage directory.
    pub fn passage_dir(&self) -> PathBuf {
        self.workspace.join(".passage")
    }

    /// Path of the persisted vector index.
    pub fn index_path(&self) -> PathBuf {
        self.passage_dir().join("index.db")
    }

    /// Ensure the .passage directory exists.
    pub fn ensure_passage_dir(&self) -> PassageResult<()> {
        let dir = self.passage_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                PassageError::Config(format!("Failed to create .passage directory: {}", e))
            })?;
        }
        Ok(())
    }
}
