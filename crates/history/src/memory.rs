use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    HistoryError, HistoryRecord, InstanceId, Result, Sequence,
    store::{HistoryStore, validate_batch},
};

/// In-memory history store.
///
/// Used by tests and by workers that run without a database; history is lost
/// when the process exits.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    instances: Arc<RwLock<HashMap<InstanceId, Vec<HistoryRecord>>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records across all instances.
    pub async fn record_count(&self) -> usize {
        self.instances.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(
        &self,
        records: Vec<HistoryRecord>,
        expected: Option<Sequence>,
    ) -> Result<Sequence> {
        validate_batch(&records)?;

        let instance_id = records[0].instance_id;
        let first_sequence = records[0].sequence;

        let mut instances = self.instances.write().await;
        let history = instances.entry(instance_id).or_default();

        let current = history
            .last()
            .map(|r| r.sequence)
            .unwrap_or(Sequence::empty());

        if let Some(expected) = expected
            && current != expected
        {
            return Err(HistoryError::Conflict {
                instance_id,
                expected,
                actual: current,
            });
        }

        // Mirrors the unique (instance_id, sequence) constraint of the SQL store.
        if first_sequence != current.next() {
            return Err(HistoryError::Conflict {
                instance_id,
                expected: expected.unwrap_or(current),
                actual: current,
            });
        }

        let last = records
            .last()
            .map(|r| r.sequence)
            .unwrap_or(current);
        history.extend(records);

        Ok(last)
    }

    async fn load(&self, instance_id: InstanceId) -> Result<Vec<HistoryRecord>> {
        Ok(self
            .instances
            .read()
            .await
            .get(&instance_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn last_sequence(&self, instance_id: InstanceId) -> Result<Option<Sequence>> {
        Ok(self
            .instances
            .read()
            .await
            .get(&instance_id)
            .and_then(|h| h.last())
            .map(|r| r.sequence))
    }

    async fn records_of_type(&self, event_type: &str) -> Result<Vec<HistoryRecord>> {
        let instances = self.instances.read().await;
        let mut records: Vec<_> = instances
            .values()
            .flatten()
            .filter(|r| r.event_type == event_type)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }
}
