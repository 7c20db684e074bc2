//! Order processing activity.

use async_trait::async_trait;
use domain::Order;
use thiserror::Error;

/// Reasons processing fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    /// No fulfillment action is wired in yet.
    #[error("not implemented")]
    NotImplemented,

    #[error("processing failed: {message}")]
    Failed { message: String, retryable: bool },
}

impl ProcessingError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessingError::NotImplemented => true,
            ProcessingError::Failed { retryable, .. } => *retryable,
        }
    }
}

/// Starts fulfillment of a validated order.
///
/// Returns an opaque token describing the result. Implementations are
/// invoked once per attempt; the runtime owns retries.
#[async_trait]
pub trait OrderProcessor: Send + Sync {
    async fn process(&self, order: &Order) -> Result<String, ProcessingError>;
}

/// Placeholder processor that always fails with `NotImplemented`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnimplementedProcessor;

#[async_trait]
impl OrderProcessor for UnimplementedProcessor {
    async fn process(&self, _order: &Order) -> Result<String, ProcessingError> {
        Err(ProcessingError::NotImplemented)
    }
}

/// Processor that accepts every order and returns a fixed token.
#[derive(Debug, Clone)]
pub struct AcceptingProcessor {
    token: String,
}

impl AcceptingProcessor {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Default for AcceptingProcessor {
    fn default() -> Self {
        Self::new("PROCESSED")
    }
}

#[async_trait]
impl OrderProcessor for AcceptingProcessor {
    async fn process(&self, order: &Order) -> Result<String, ProcessingError> {
        tracing::debug!(order_id = %order.id, "order accepted for fulfillment");
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unimplemented_processor_fails_retryably() {
        let err = UnimplementedProcessor
            .process(&Order::default())
            .await
            .unwrap_err();
        assert_eq!(err, ProcessingError::NotImplemented);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_accepting_processor_returns_token() {
        let token = AcceptingProcessor::default()
            .process(&Order::default())
            .await
            .unwrap();
        assert_eq!(token, "PROCESSED");
    }

    #[test]
    fn test_failed_classification() {
        let permanent = ProcessingError::Failed {
            message: "carrier rejected".into(),
            retryable: false,
        };
        assert!(!permanent.is_retryable());
        assert_eq!(permanent.to_string(), "processing failed: carrier rejected");
    }
}
