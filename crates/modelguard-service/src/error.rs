//! Service-layer error types
//!
//! This module defines error types specific to the service layer,
//! mapping domain and database errors to service-level errors.

use modelguard_core::RegistryError;
use modelguard_db::DbError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Service-layer error types
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Artifact not found
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Artifact already exists (duplicate id)
    #[error("Artifact already exists: {0}")]
    AlreadyExists(String),

    /// Validation failed (e.g. a non-finite score)
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An external collaborator (extractor, classifier, popularity source) failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Internal service error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ArtifactNotFound(msg) => ServiceError::NotFound(msg),
            RegistryError::KindMismatch { .. } | RegistryError::InvalidArtifactKind(_) => {
                ServiceError::InvalidInput(err.to_string())
            }
            RegistryError::InvalidId(msg) => ServiceError::InvalidInput(msg),
            RegistryError::InvalidScore { .. } => ServiceError::ValidationFailed(err.to_string()),
            RegistryError::ValidationError(msg) => ServiceError::ValidationFailed(msg),
            RegistryError::SerializationError(msg) => ServiceError::Internal(msg),
            RegistryError::InternalError(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            DbError::AlreadyExists(msg) => ServiceError::AlreadyExists(msg),
            DbError::ConstraintViolation(msg) => ServiceError::ValidationFailed(msg),
            DbError::InvalidData(msg) => ServiceError::ValidationFailed(msg),
            DbError::InvalidQuery(msg) => ServiceError::InvalidInput(msg),
            DbError::Connection(msg)
            | DbError::Pool(msg)
            | DbError::Query(msg)
            | DbError::Blob(msg) => ServiceError::Database(msg),
            DbError::Serialization(msg)
            | DbError::Configuration(msg)
            | DbError::Migration(msg)
            | DbError::Internal(msg) => ServiceError::Internal(msg),
            DbError::Domain(err) => ServiceError::from(err),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(format!("Serialization error: {}", err))
    }
}

/// Failure of a single metric evaluation.
///
/// The score engine turns every variant into a `0.0` score; none of them
/// aborts the batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// An input the metric depends on is absent
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// An input has the wrong shape or range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Looking up a related artifact failed
    #[error("Store lookup failed: {0}")]
    Store(String),

    /// An external collaborator failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// The evaluation exceeded its time budget
    #[error("Metric timed out after {0:?}")]
    Timeout(Duration),

    /// The evaluation panicked
    #[error("Metric panicked: {0}")]
    Panicked(String),

    /// The worker pool shut down before the metric ran
    #[error("Metric cancelled")]
    Cancelled,
}

impl From<DbError> for MetricError {
    fn from(err: DbError) -> Self {
        MetricError::Store(err.to_string())
    }
}
