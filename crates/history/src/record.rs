use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{HistoryError, InstanceId, Result};

/// Unique identifier for a single history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random record ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a record ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of a record within one instance's history.
///
/// The first record of an instance has sequence 1; an instance with no
/// records sits at sequence 0.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(i64);

impl Sequence {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The position of an instance that has no history yet.
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One persisted entry in an instance's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub record_id: RecordId,

    /// The instance this record belongs to.
    pub instance_id: InstanceId,

    /// Name of the lifecycle event stored in `payload` (e.g. "SignalReceived").
    pub event_type: String,

    /// Position within the instance history.
    pub sequence: Sequence,

    pub recorded_at: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl HistoryRecord {
    pub fn builder() -> HistoryRecordBuilder {
        HistoryRecordBuilder::default()
    }

    /// Deserializes the payload into a concrete event type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Builder for history records.
#[derive(Debug, Default)]
pub struct HistoryRecordBuilder {
    record_id: Option<RecordId>,
    instance_id: Option<InstanceId>,
    event_type: Option<String>,
    sequence: Option<Sequence>,
    recorded_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
}

impl HistoryRecordBuilder {
    /// Sets the record ID. A random one is generated when unset.
    pub fn record_id(mut self, id: RecordId) -> Self {
        self.record_id = Some(id);
        self
    }

    pub fn instance_id(mut self, id: InstanceId) -> Self {
        self.instance_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Sets the record time. Defaults to now.
    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the record, failing if a required field was not set.
    pub fn build(self) -> Result<HistoryRecord> {
        Ok(HistoryRecord {
            record_id: self.record_id.unwrap_or_default(),
            instance_id: self
                .instance_id
                .ok_or(HistoryError::IncompleteRecord("instance_id"))?,
            event_type: self
                .event_type
                .ok_or(HistoryError::IncompleteRecord("event_type"))?,
            sequence: self
                .sequence
                .ok_or(HistoryError::IncompleteRecord("sequence"))?,
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
            payload: self
                .payload
                .ok_or(HistoryError::IncompleteRecord("payload"))?,
        })
    }
}
