//! Serialized appends to one instance's history.

use common::InstanceId;
use history::{HistoryStore, Sequence};
use tokio::sync::{Mutex, mpsc};

use crate::error::{LifecycleError, Result};
use crate::events::LifecycleEvent;
use crate::signals::LifecycleSignal;

#[derive(Debug)]
struct JournalState {
    sequence: Sequence,
    closed: bool,
}

/// The single writer for an instance's history.
///
/// Both the instance task and signal delivery append through the journal, so
/// every append carries the expected sequence and none of them race.
pub(crate) struct Journal<S> {
    store: S,
    instance_id: InstanceId,
    state: Mutex<JournalState>,
}

impl<S: HistoryStore> Journal<S> {
    pub(crate) fn new(store: S, instance_id: InstanceId, sequence: Sequence) -> Self {
        Self {
            store,
            instance_id,
            state: Mutex::new(JournalState {
                sequence,
                closed: false,
            }),
        }
    }

    /// Appends an event and returns its sequence.
    pub(crate) async fn record(&self, event: &LifecycleEvent) -> Result<Sequence> {
        let mut state = self.state.lock().await;
        let sequence = self.append(&mut state, event).await?;
        if matches!(event, LifecycleEvent::LifecycleClosed(_)) {
            state.closed = true;
        }
        Ok(sequence)
    }

    /// Makes a signal durable, then hands it to the running instance.
    ///
    /// Holding the lock across both steps keeps inbox order equal to history
    /// order.
    pub(crate) async fn record_signal(
        &self,
        signal: LifecycleSignal,
        inbox: &mpsc::UnboundedSender<LifecycleSignal>,
    ) -> Result<Sequence> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LifecycleError::Closed(self.instance_id));
        }
        if inbox.is_closed() {
            return Err(LifecycleError::InboxClosed(self.instance_id));
        }

        let sequence = self
            .append(&mut state, &LifecycleEvent::signal_received(signal))
            .await?;
        inbox
            .send(signal)
            .map_err(|_| LifecycleError::InboxClosed(self.instance_id))?;
        Ok(sequence)
    }

    pub(crate) async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    async fn append(&self, state: &mut JournalState, event: &LifecycleEvent) -> Result<Sequence> {
        let record = event.to_record(self.instance_id, state.sequence.next())?;
        let sequence = self.store.append(vec![record], Some(state.sequence)).await?;
        state.sequence = sequence;
        Ok(sequence)
    }
}
