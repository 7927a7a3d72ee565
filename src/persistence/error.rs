//! This module contains the error types for the persistence layer.

use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A general error occurred during a data store operation.
    #[error("A data store operation failed: {0}")]
    OperationFailed(String),

    /// The requested item was not found in the data store.
    #[error("The requested item was not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded into its model type.
    #[error("Failed to serialize or deserialize data: {0}")]
    SerializationError(String),

    /// An error occurred during a database migration.
    #[error("A data migration failed: {0}")]
    MigrationError(String),

    /// An invalid configuration or input was provided.
    #[error("An invalid configuration or input was provided: {0}")]
    InvalidInput(String),

    /// A uniqueness constraint rejected the write.
    #[error("Item already exists: {0}")]
    AlreadyExists(String),

    /// A conditional write found the row in an unexpected state.
    #[error("Conflicting concurrent update: {0}")]
    Conflict(String),
}

impl PersistenceError {
    /// Whether the error comes from a concurrent writer rather than from the
    /// store itself.
    pub fn is_contention(&self) -> bool {
        matches!(self, PersistenceError::AlreadyExists(_) | PersistenceError::Conflict(_))
    }
}
