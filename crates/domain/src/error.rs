//! Domain error types.

use thiserror::Error;

/// Errors raised by domain types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A string did not name one of the known order statuses.
    #[error("Invalid order status: {0:?}")]
    InvalidStatus(String),
}
