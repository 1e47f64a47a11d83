//! Passage Core Library
//!
//! Foundational utilities shared across the passage workspace:
//! - Error handling (`PassageError`, `PassageResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{PassageError, PassageResult};
