//! Error types for the glove controller.
//!
//! The scheduling core itself cannot fail; errors only arise at the edges:
//! loading configuration, opening the audit export, and talking to a
//! service task that has already shut down.

use thiserror::Error;
use vcr::config::ConfigError;

/// Errors surfaced by the glove controller.
#[derive(Error, Debug)]
pub enum GloveError {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },

    /// The service task is gone; no further commands are accepted.
    #[error("Glove service has stopped")]
    ServiceStopped,
}

/// Result type for glove controller operations
pub type GloveResult<T> = Result<T, GloveError>;
