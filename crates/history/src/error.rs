use thiserror::Error;

use crate::{InstanceId, Sequence};

/// Errors that can occur when reading or writing instance history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Another writer appended to the instance since it was last read.
    #[error(
        "History conflict for instance {instance_id}: expected sequence {expected}, found {actual}"
    )]
    Conflict {
        instance_id: InstanceId,
        expected: Sequence,
        actual: Sequence,
    },

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A record could not be built because a required field was missing.
    #[error("Incomplete record: missing {0}")]
    IncompleteRecord(&'static str),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
