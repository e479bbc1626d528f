use thiserror::Error;

/// Top-level error type for the Knowledge system.
///
/// Subsystem crates define their own error types and convert into or out of
/// `KnowledgeError` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KnowledgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for KnowledgeError {
    fn from(err: toml::de::Error) -> Self {
        KnowledgeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for KnowledgeError {
    fn from(err: toml::ser::Error) -> Self {
        KnowledgeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for KnowledgeError {
    fn from(err: serde_json::Error) -> Self {
        KnowledgeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Knowledge operations.
pub type Result<T> = std::result::Result<T, KnowledgeError>;
