//! Error types shared by the ETL crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, QuotesError>;

/// Main error type for configuration and shared plumbing
#[derive(Error, Debug)]
pub enum QuotesError {
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QuotesError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
