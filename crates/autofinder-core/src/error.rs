use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the AutoFinder workspace.
///
/// Subsystem crates define their own error types where the caller needs a
/// narrower taxonomy and convert from `AutoFinderError` so that `?` works
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AutoFinderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog not found: {}", .0.display())]
    CatalogMissing(PathBuf),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for AutoFinderError {
    fn from(err: toml::de::Error) -> Self {
        AutoFinderError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AutoFinderError {
    fn from(err: toml::ser::Error) -> Self {
        AutoFinderError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AutoFinderError {
    fn from(err: serde_json::Error) -> Self {
        AutoFinderError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for AutoFinder operations.
pub type Result<T> = std::result::Result<T, AutoFinderError>;
