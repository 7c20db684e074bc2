use async_trait::async_trait;

use crate::{HistoryError, HistoryRecord, InstanceId, Result, Sequence};

/// Storage backend for instance histories.
///
/// Implementations must be thread-safe and must append each batch atomically.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends records to one instance's history.
    ///
    /// When `expected` is set, the append fails with `HistoryError::Conflict`
    /// unless the instance currently sits at exactly that sequence.
    ///
    /// Returns the sequence of the last appended record.
    async fn append(&self, records: Vec<HistoryRecord>, expected: Option<Sequence>)
    -> Result<Sequence>;

    /// Loads the full history of an instance, ordered by sequence.
    async fn load(&self, instance_id: InstanceId) -> Result<Vec<HistoryRecord>>;

    /// Returns the sequence of the newest record, or None for unknown instances.
    async fn last_sequence(&self, instance_id: InstanceId) -> Result<Option<Sequence>>;

    /// Returns every record with the given event type across all instances,
    /// oldest first.
    async fn records_of_type(&self, event_type: &str) -> Result<Vec<HistoryRecord>>;
}

/// Convenience methods available on every history store.
#[async_trait]
pub trait HistoryStoreExt: HistoryStore {
    /// Appends a single record.
    async fn append_one(&self, record: HistoryRecord, expected: Option<Sequence>) -> Result<Sequence> {
        self.append(vec![record], expected).await
    }

    /// Returns true if any record exists for the instance.
    async fn instance_exists(&self, instance_id: InstanceId) -> Result<bool> {
        Ok(self.last_sequence(instance_id).await?.is_some())
    }
}

impl<T: HistoryStore + ?Sized> HistoryStoreExt for T {}

/// Checks that a batch targets one instance with consecutive sequences.
pub(crate) fn validate_batch(records: &[HistoryRecord]) -> Result<()> {
    let Some(first) = records.first() else {
        return Err(HistoryError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected = first.sequence;
    for record in records.iter().skip(1) {
        if record.instance_id != first.instance_id {
            return Err(HistoryError::InvalidAppend(
                "all records must belong to the same instance".to_string(),
            ));
        }
        expected = expected.next();
        if record.sequence != expected {
            return Err(HistoryError::InvalidAppend(format!(
                "sequences must be consecutive: expected {}, got {}",
                expected, record.sequence
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(instance_id: InstanceId, sequence: i64) -> HistoryRecord {
        HistoryRecord::builder()
            .instance_id(instance_id)
            .event_type("StatusChanged")
            .sequence(Sequence::new(sequence))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            validate_batch(&[]),
            Err(HistoryError::InvalidAppend(_))
        ));
    }

    #[test]
    fn mixed_instances_are_rejected() {
        let batch = vec![record(InstanceId::new(), 1), record(InstanceId::new(), 2)];
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn gaps_are_rejected() {
        let id = InstanceId::new();
        let batch = vec![record(id, 1), record(id, 3)];
        assert!(validate_batch(&batch).is_err());
    }

    #[test]
    fn consecutive_batch_is_accepted() {
        let id = InstanceId::new();
        let batch = vec![record(id, 4), record(id, 5), record(id, 6)];
        assert!(validate_batch(&batch).is_ok());
    }
}
