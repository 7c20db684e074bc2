//! Lifecycle runtime error types.

use common::InstanceId;
use history::HistoryError;
use thiserror::Error;

/// Errors raised by the lifecycle runtime.
///
/// Business failures (a rejected order, a failed processing step) are not
/// errors at this level: they end the lifecycle with a terminal status and a
/// `StepFailure`. These variants cover the host itself.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No lifecycle instance exists with this ID.
    #[error("Lifecycle instance not found: {0}")]
    NotFound(InstanceId),

    /// The instance reached a terminal status and accepts no more signals.
    #[error("Lifecycle instance {0} has already ended")]
    Closed(InstanceId),

    /// The instance task stopped without reaching a terminal status.
    #[error("Lifecycle instance {0} stopped before reaching a terminal status")]
    Aborted(InstanceId),

    /// Recorded history does not match the decisions the state machine makes.
    #[error("History mismatch for {instance_id}: expected {expected}, found {found}")]
    HistoryMismatch {
        instance_id: InstanceId,
        expected: &'static str,
        found: String,
    },

    /// The history does not start with a `LifecycleStarted` event.
    #[error("History for {0} is missing its start event")]
    MissingStart(InstanceId),

    /// The signal inbox of a running instance was dropped.
    #[error("Signal inbox closed for instance {0}")]
    InboxClosed(InstanceId),

    /// History store error.
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for lifecycle results.
pub type Result<T> = std::result::Result<T, LifecycleError>;
