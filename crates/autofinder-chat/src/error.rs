//! Error types for the conversational engine.

use autofinder_core::error::AutoFinderError;

/// Errors that fail a conversational turn.
///
/// Retrieval and generation failures are surfaced to the caller, never
/// replaced by an empty or canned reply.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<AutoFinderError> for ChatError {
    fn from(err: AutoFinderError) -> Self {
        match err {
            AutoFinderError::Generation(msg) => ChatError::Generation(msg),
            AutoFinderError::Config(msg) => ChatError::Config(msg),
            other => ChatError::Retrieval(other.to_string()),
        }
    }
}
