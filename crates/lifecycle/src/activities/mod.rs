//! Activities: the retryable units of work a lifecycle invokes.

pub mod processor;
pub mod validator;

use std::sync::Arc;

use domain::Order;
use serde::{Deserialize, Serialize};

pub use processor::{AcceptingProcessor, OrderProcessor, ProcessingError, UnimplementedProcessor};
pub use validator::{OrderValidator, ValidationError};

use crate::services::InventoryGateway;

/// The activities a lifecycle can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Validate,
    Process,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Validate => "validate",
            ActivityKind::Process => "process",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed activity attempt, reduced to what the runtime needs to decide
/// whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFailure {
    pub message: String,
    pub retryable: bool,
}

impl From<ValidationError> for ActivityFailure {
    fn from(err: ValidationError) -> Self {
        Self {
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

impl From<ProcessingError> for ActivityFailure {
    fn from(err: ProcessingError) -> Self {
        Self {
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

/// The set of activity implementations a host dispatches to.
#[derive(Clone)]
pub struct OrderActivities {
    validator: Arc<OrderValidator>,
    processor: Arc<dyn OrderProcessor>,
}

impl OrderActivities {
    pub fn new(validator: OrderValidator, processor: Arc<dyn OrderProcessor>) -> Self {
        Self {
            validator: Arc::new(validator),
            processor,
        }
    }

    /// Builds the activities from an inventory gateway and a processor.
    pub fn with_gateway(
        gateway: Arc<dyn InventoryGateway>,
        processor: Arc<dyn OrderProcessor>,
    ) -> Self {
        Self::new(OrderValidator::new(gateway), processor)
    }

    /// Runs one attempt of an activity.
    ///
    /// Validation yields no result value; processing yields its token.
    pub async fn run(
        &self,
        kind: ActivityKind,
        order: &Order,
    ) -> Result<Option<String>, ActivityFailure> {
        match kind {
            ActivityKind::Validate => self
                .validator
                .validate(order)
                .await
                .map(|()| None)
                .map_err(ActivityFailure::from),
            ActivityKind::Process => self
                .processor
                .process(order)
                .await
                .map(Some)
                .map_err(ActivityFailure::from),
        }
    }
}
