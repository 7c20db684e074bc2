//! Lifecycle history events.

use chrono::{DateTime, Utc};
use common::InstanceId;
use domain::{DomainEvent, Order, OrderStatus};
use history::{HistoryRecord, Sequence};
use serde::{Deserialize, Serialize};

use crate::activities::ActivityKind;
use crate::instance::StepFailure;
use crate::signals::LifecycleSignal;

/// Events recorded in a lifecycle instance's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LifecycleEvent {
    /// The instance was created for an order.
    LifecycleStarted(LifecycleStartedData),

    /// One activity attempt failed; a retry may follow.
    ActivityAttemptFailed(ActivityAttemptData),

    /// An activity finished successfully.
    ActivityCompleted(ActivityCompletedData),

    /// An activity failed for good (non-retryable or attempts exhausted).
    ActivityFailed(ActivityFailedData),

    /// A signal was delivered to the instance inbox.
    SignalReceived(SignalData),

    /// A wait point consumed a buffered signal.
    SignalConsumed(SignalData),

    /// A wait point gave up before any of its signals arrived.
    WaitExpired(WaitExpiredData),

    /// The live status changed.
    StatusChanged(StatusChangedData),

    /// The instance reached a terminal status.
    LifecycleClosed(LifecycleClosedData),
}

impl DomainEvent for LifecycleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::LifecycleStarted(_) => "LifecycleStarted",
            LifecycleEvent::ActivityAttemptFailed(_) => "ActivityAttemptFailed",
            LifecycleEvent::ActivityCompleted(_) => "ActivityCompleted",
            LifecycleEvent::ActivityFailed(_) => "ActivityFailed",
            LifecycleEvent::SignalReceived(_) => "SignalReceived",
            LifecycleEvent::SignalConsumed(_) => "SignalConsumed",
            LifecycleEvent::WaitExpired(_) => "WaitExpired",
            LifecycleEvent::StatusChanged(_) => "StatusChanged",
            LifecycleEvent::LifecycleClosed(_) => "LifecycleClosed",
        }
    }
}

/// Data for LifecycleStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleStartedData {
    pub instance_id: InstanceId,
    /// The task queue the instance was started on.
    pub task_queue: String,
    pub order: Order,
    pub started_at: DateTime<Utc>,
}

/// Data for ActivityAttemptFailed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityAttemptData {
    pub activity: ActivityKind,
    /// 1-based attempt number.
    pub attempt: u32,
    pub error: String,
    pub retryable: bool,
}

/// Data for ActivityCompleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCompletedData {
    pub activity: ActivityKind,
    pub result: Option<String>,
}

/// Data for ActivityFailed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFailedData {
    pub activity: ActivityKind,
    pub error: String,
}

/// Data for SignalReceived and SignalConsumed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalData {
    pub signal: LifecycleSignal,
}

/// Data for WaitExpired event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitExpiredData {
    /// The signals the expired wait was selecting over.
    pub signals: Vec<LifecycleSignal>,
}

/// Data for StatusChanged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub status: OrderStatus,
}

/// Data for LifecycleClosed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleClosedData {
    pub status: OrderStatus,
    pub failure: Option<StepFailure>,
    pub closed_at: DateTime<Utc>,
}

// Convenience constructors
impl LifecycleEvent {
    pub fn lifecycle_started(
        instance_id: InstanceId,
        task_queue: impl Into<String>,
        order: Order,
    ) -> Self {
        LifecycleEvent::LifecycleStarted(LifecycleStartedData {
            instance_id,
            task_queue: task_queue.into(),
            order,
            started_at: Utc::now(),
        })
    }

    pub fn activity_attempt_failed(
        activity: ActivityKind,
        attempt: u32,
        error: impl Into<String>,
        retryable: bool,
    ) -> Self {
        LifecycleEvent::ActivityAttemptFailed(ActivityAttemptData {
            activity,
            attempt,
            error: error.into(),
            retryable,
        })
    }

    pub fn activity_completed(activity: ActivityKind, result: Option<String>) -> Self {
        LifecycleEvent::ActivityCompleted(ActivityCompletedData { activity, result })
    }

    pub fn activity_failed(activity: ActivityKind, error: impl Into<String>) -> Self {
        LifecycleEvent::ActivityFailed(ActivityFailedData {
            activity,
            error: error.into(),
        })
    }

    pub fn signal_received(signal: LifecycleSignal) -> Self {
        LifecycleEvent::SignalReceived(SignalData { signal })
    }

    pub fn signal_consumed(signal: LifecycleSignal) -> Self {
        LifecycleEvent::SignalConsumed(SignalData { signal })
    }

    pub fn wait_expired(signals: &[LifecycleSignal]) -> Self {
        LifecycleEvent::WaitExpired(WaitExpiredData {
            signals: signals.to_vec(),
        })
    }

    pub fn status_changed(status: OrderStatus) -> Self {
        LifecycleEvent::StatusChanged(StatusChangedData { status })
    }

    pub fn lifecycle_closed(status: OrderStatus, failure: Option<StepFailure>) -> Self {
        LifecycleEvent::LifecycleClosed(LifecycleClosedData {
            status,
            failure,
            closed_at: Utc::now(),
        })
    }

    /// Wraps the event in a history record at `sequence`.
    pub fn to_record(
        &self,
        instance_id: InstanceId,
        sequence: Sequence,
    ) -> history::Result<HistoryRecord> {
        HistoryRecord::builder()
            .instance_id(instance_id)
            .event_type(self.event_type())
            .sequence(sequence)
            .payload(self)?
            .build()
    }

    /// Decodes an event from a history record.
    pub fn from_record(record: &HistoryRecord) -> history::Result<Self> {
        record.decode()
    }

    /// Short label used in replay mismatch errors.
    pub(crate) fn describe(&self) -> String {
        match self {
            LifecycleEvent::ActivityCompleted(data) => {
                format!("ActivityCompleted({})", data.activity)
            }
            LifecycleEvent::ActivityFailed(data) => format!("ActivityFailed({})", data.activity),
            LifecycleEvent::SignalConsumed(data) => format!("SignalConsumed({})", data.signal),
            LifecycleEvent::StatusChanged(data) => format!("StatusChanged({})", data.status),
            other => other.event_type().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(
            LifecycleEvent::signal_received(LifecycleSignal::Pick).event_type(),
            "SignalReceived"
        );
        assert_eq!(
            LifecycleEvent::status_changed(OrderStatus::Placed).event_type(),
            "StatusChanged"
        );
        assert_eq!(
            LifecycleEvent::lifecycle_closed(OrderStatus::Completed, None).event_type(),
            "LifecycleClosed"
        );
    }

    #[test]
    fn test_adjacently_tagged_payload() {
        let event = LifecycleEvent::status_changed(OrderStatus::UnableToComplete);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "StatusChanged");
        assert_eq!(json["data"]["status"], "UNABLE_TO_COMPLETE");
    }

    #[test]
    fn test_record_carries_type_and_sequence() {
        let instance_id = InstanceId::new();
        let event = LifecycleEvent::activity_attempt_failed(
            ActivityKind::Validate,
            2,
            "inventory service unavailable (status: 503)",
            true,
        );

        let record = event.to_record(instance_id, Sequence::new(3)).unwrap();
        assert_eq!(record.instance_id, instance_id);
        assert_eq!(record.event_type, "ActivityAttemptFailed");
        assert_eq!(record.sequence, Sequence::new(3));
        assert_eq!(LifecycleEvent::from_record(&record).unwrap(), event);
    }

    #[test]
    fn test_closed_event_keeps_failure() {
        let failure = StepFailure::new(ActivityKind::Process, "not implemented");
        let event = LifecycleEvent::lifecycle_closed(OrderStatus::UnableToComplete, Some(failure));
        let record = event.to_record(InstanceId::new(), Sequence::new(1)).unwrap();

        match LifecycleEvent::from_record(&record).unwrap() {
            LifecycleEvent::LifecycleClosed(data) => {
                assert_eq!(data.status, OrderStatus::UnableToComplete);
                let failure = data.failure.unwrap();
                assert_eq!(failure.step, ActivityKind::Process);
                assert_eq!(failure.message, "not implemented");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
