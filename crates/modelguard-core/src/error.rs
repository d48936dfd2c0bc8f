//! Error types for the ModelGuard domain

use thiserror::Error;

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Main error type for domain operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Artifact not found
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Invalid artifact kind
    #[error("Invalid artifact kind: {0}")]
    InvalidArtifactKind(String),

    /// Attempt to change an artifact's kind after creation
    #[error("Artifact kind is immutable: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },

    /// Invalid identifier
    #[error("Invalid artifact id: {0}")]
    InvalidId(String),

    /// Score map contains a value that cannot be compared
    #[error("Invalid score for {metric}: {reason}")]
    InvalidScore { metric: String, reason: String },

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::SerializationError(err.to_string())
    }
}
