//! Lifecycle instance aggregate.

use common::InstanceId;
use domain::{Aggregate, Order, OrderStatus};
use history::{HistoryRecord, Sequence};
use serde::{Deserialize, Serialize};

use crate::activities::ActivityKind;
use crate::error::{LifecycleError, Result};
use crate::events::LifecycleEvent;
use crate::signals::LifecycleSignal;

/// The step that ended a lifecycle unsuccessfully, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: ActivityKind,
    pub message: String,
}

impl StepFailure {
    pub fn new(step: ActivityKind, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.step, self.message)
    }
}

/// What the submitter of an order finally observes.
///
/// `failure` is set exactly when the status is `UNABLE_TO_COMPLETE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleOutcome {
    pub status: OrderStatus,
    pub failure: Option<StepFailure>,
}

impl LifecycleOutcome {
    pub fn is_success(&self) -> bool {
        self.status == OrderStatus::Completed
    }
}

/// A lifecycle instance rebuilt from its history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleInstance {
    id: Option<InstanceId>,
    sequence: Sequence,
    task_queue: String,
    order: Option<Order>,
    /// None until the first transition.
    status: Option<OrderStatus>,
    /// Received but not yet consumed, in arrival order.
    pending_signals: Vec<LifecycleSignal>,
    failed_attempts: u32,
    processing_result: Option<String>,
    outcome: Option<LifecycleOutcome>,
}

impl Aggregate for LifecycleInstance {
    type Event = LifecycleEvent;

    fn aggregate_type() -> &'static str {
        "OrderLifecycle"
    }

    fn id(&self) -> Option<InstanceId> {
        self.id
    }

    fn sequence(&self) -> Sequence {
        self.sequence
    }

    fn set_sequence(&mut self, sequence: Sequence) {
        self.sequence = sequence;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            LifecycleEvent::LifecycleStarted(data) => {
                self.id = Some(data.instance_id);
                self.task_queue = data.task_queue;
                self.order = Some(data.order);
            }
            LifecycleEvent::ActivityAttemptFailed(_) => {
                self.failed_attempts += 1;
            }
            LifecycleEvent::ActivityCompleted(data) => {
                if data.activity == ActivityKind::Process {
                    self.processing_result = data.result;
                }
            }
            LifecycleEvent::ActivityFailed(_) => {
                // The terminal outcome arrives with LifecycleClosed
            }
            LifecycleEvent::SignalReceived(data) => {
                self.pending_signals.push(data.signal);
            }
            LifecycleEvent::SignalConsumed(data) => {
                if let Some(pos) = self.pending_signals.iter().position(|s| *s == data.signal) {
                    self.pending_signals.remove(pos);
                }
            }
            LifecycleEvent::WaitExpired(_) => {}
            LifecycleEvent::StatusChanged(data) => {
                self.status = Some(data.status);
            }
            LifecycleEvent::LifecycleClosed(data) => {
                self.status = Some(data.status);
                self.outcome = Some(LifecycleOutcome {
                    status: data.status,
                    failure: data.failure,
                });
            }
        }
    }
}

impl LifecycleInstance {
    /// Folds a full instance history.
    ///
    /// The first record must be the instance's `LifecycleStarted` event.
    pub fn from_history(records: &[HistoryRecord]) -> Result<Self> {
        let mut instance = Self::default();

        for record in records {
            let event = LifecycleEvent::from_record(record)?;
            if instance.id.is_none() && !matches!(event, LifecycleEvent::LifecycleStarted(_)) {
                return Err(LifecycleError::MissingStart(record.instance_id));
            }
            instance.apply(event);
            instance.set_sequence(record.sequence);
        }

        Ok(instance)
    }

    pub fn task_queue(&self) -> &str {
        &self.task_queue
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Returns the live status, or None before the first transition.
    pub fn status(&self) -> Option<OrderStatus> {
        self.status
    }

    pub fn pending_signals(&self) -> &[LifecycleSignal] {
        &self.pending_signals
    }

    /// Total failed activity attempts across all activities.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn processing_result(&self) -> Option<&str> {
        self.processing_result.as_deref()
    }

    pub fn outcome(&self) -> Option<&LifecycleOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.outcome.is_some()
    }
}
