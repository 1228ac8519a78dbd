use thiserror::Error;

/// Errors that can occur in a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No job with the given ID exists in the store.
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// A job with the given ID is already persisted.
    #[error("Job already exists: {id}")]
    DuplicateJob { id: String },

    /// Invalid record (e.g. malformed cron interval at insert time).
    #[error(transparent)]
    Core(#[from] cronbeat_core::CoreError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
