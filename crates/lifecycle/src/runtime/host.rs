//! Hosts lifecycle instances: start, signal, query, recover.

use std::collections::HashMap;
use std::sync::Arc;

use common::InstanceId;
use domain::{Order, OrderStatus};
use history::{HistoryStore, Sequence};
use tokio::sync::{RwLock, mpsc, watch};
use tracing::Instrument;

use super::context::LifecycleContext;
use super::journal::Journal;
use crate::activities::OrderActivities;
use crate::error::{LifecycleError, Result};
use crate::events::LifecycleEvent;
use crate::instance::{LifecycleInstance, LifecycleOutcome};
use crate::signals::LifecycleSignal;
use crate::workflow::{LifecycleOptions, order_lifecycle};

/// In-memory handles to a running instance.
struct InstanceRuntime<S> {
    journal: Arc<Journal<S>>,
    signals: mpsc::UnboundedSender<LifecycleSignal>,
    status: watch::Receiver<Option<OrderStatus>>,
    outcome: watch::Receiver<Option<LifecycleOutcome>>,
}

/// Runs lifecycle instances on one task queue.
///
/// Each instance runs as its own tokio task. While it runs, queries are
/// answered from its status cell; once it closes it is dropped from memory
/// and queries fall back to folding its history.
pub struct LifecycleHost<S> {
    store: S,
    activities: OrderActivities,
    options: Arc<LifecycleOptions>,
    task_queue: Arc<str>,
    instances: Arc<RwLock<HashMap<InstanceId, Arc<InstanceRuntime<S>>>>>,
}

impl<S: Clone> Clone for LifecycleHost<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            activities: self.activities.clone(),
            options: Arc::clone(&self.options),
            task_queue: Arc::clone(&self.task_queue),
            instances: Arc::clone(&self.instances),
        }
    }
}

impl<S> LifecycleHost<S>
where
    S: HistoryStore + Clone + 'static,
{
    /// Creates a host with default lifecycle options.
    pub fn new(store: S, activities: OrderActivities, task_queue: impl Into<String>) -> Self {
        Self {
            store,
            activities,
            options: Arc::new(LifecycleOptions::default()),
            task_queue: Arc::from(task_queue.into()),
            instances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_options(mut self, options: LifecycleOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn task_queue(&self) -> &str {
        &self.task_queue
    }

    pub fn options(&self) -> &LifecycleOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of instances currently running on this host.
    pub async fn running_count(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Starts a new lifecycle for an order.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id, task_queue = %self.task_queue))]
    pub async fn start(&self, order: Order) -> Result<LifecycleHandle<S>> {
        let instance_id = InstanceId::new();
        let started =
            LifecycleEvent::lifecycle_started(instance_id, &*self.task_queue, order.clone());
        let record = started.to_record(instance_id, Sequence::empty().next())?;
        let sequence = self
            .store
            .append(vec![record], Some(Sequence::empty()))
            .await?;

        metrics::counter!("lifecycle_started_total").increment(1);
        tracing::info!(%instance_id, "lifecycle started");

        self.spawn(instance_id, order, sequence, Vec::new()).await;
        Ok(self.handle(instance_id))
    }

    /// Delivers a signal to an instance.
    #[tracing::instrument(skip(self))]
    pub async fn signal(&self, instance_id: InstanceId, signal: LifecycleSignal) -> Result<()> {
        match self.runtime(instance_id).await {
            Some(runtime) => {
                runtime
                    .journal
                    .record_signal(signal, &runtime.signals)
                    .await?;
                metrics::counter!("signals_received_total", "signal" => signal.as_str())
                    .increment(1);
                tracing::debug!(%instance_id, %signal, "signal delivered");
                Ok(())
            }
            None => {
                let instance = self.load_instance(instance_id).await?;
                if instance.is_closed() {
                    Err(LifecycleError::Closed(instance_id))
                } else {
                    Err(LifecycleError::Aborted(instance_id))
                }
            }
        }
    }

    /// Returns the current status, or None while the instance is still
    /// validating.
    pub async fn query_status(&self, instance_id: InstanceId) -> Result<Option<OrderStatus>> {
        if let Some(runtime) = self.runtime(instance_id).await {
            return Ok(*runtime.status.borrow());
        }

        Ok(self.load_instance(instance_id).await?.status())
    }

    /// Waits for the instance's terminal outcome.
    pub async fn result(&self, instance_id: InstanceId) -> Result<LifecycleOutcome> {
        if let Some(runtime) = self.runtime(instance_id).await {
            let mut outcome = runtime.outcome.clone();
            drop(runtime);

            let finished = outcome
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|value| (*value).clone());
            if let Some(finished) = finished {
                return Ok(finished);
            }
        }

        self.load_instance(instance_id)
            .await?
            .outcome()
            .cloned()
            .ok_or(LifecycleError::Aborted(instance_id))
    }

    /// Folds the instance history into its current state.
    pub async fn describe(&self, instance_id: InstanceId) -> Result<LifecycleInstance> {
        self.load_instance(instance_id).await
    }

    /// Resumes every unfinished instance started on this host's task queue.
    ///
    /// Returns the ids of the resumed instances.
    #[tracing::instrument(skip(self), fields(task_queue = %self.task_queue))]
    pub async fn recover(&self) -> Result<Vec<InstanceId>> {
        let mut resumed = Vec::new();

        for record in self.store.records_of_type("LifecycleStarted").await? {
            let LifecycleEvent::LifecycleStarted(started) = LifecycleEvent::from_record(&record)?
            else {
                continue;
            };
            if started.task_queue != *self.task_queue {
                continue;
            }

            let instance_id = started.instance_id;
            if self.runtime(instance_id).await.is_some() {
                continue;
            }

            let records = self.store.load(instance_id).await?;
            let events = records
                .iter()
                .map(LifecycleEvent::from_record)
                .collect::<history::Result<Vec<_>>>()?;
            if events
                .iter()
                .any(|event| matches!(event, LifecycleEvent::LifecycleClosed(_)))
            {
                continue;
            }

            let sequence = records.last().map(|r| r.sequence).unwrap_or_default();
            tracing::info!(%instance_id, %sequence, "resuming lifecycle");
            self.spawn(instance_id, started.order, sequence, events)
                .await;
            resumed.push(instance_id);
        }

        tracing::info!(count = resumed.len(), "recovery finished");
        Ok(resumed)
    }

    pub fn handle(&self, instance_id: InstanceId) -> LifecycleHandle<S> {
        LifecycleHandle {
            instance_id,
            host: self.clone(),
        }
    }

    async fn runtime(&self, instance_id: InstanceId) -> Option<Arc<InstanceRuntime<S>>> {
        self.instances.read().await.get(&instance_id).cloned()
    }

    async fn load_instance(&self, instance_id: InstanceId) -> Result<LifecycleInstance> {
        let records = self.store.load(instance_id).await?;
        if records.is_empty() {
            return Err(LifecycleError::NotFound(instance_id));
        }
        LifecycleInstance::from_history(&records)
    }

    /// Registers the instance, then runs it on its own task.
    ///
    /// Registration happens before the task starts so the status cell is
    /// queryable from the first moment.
    async fn spawn(
        &self,
        instance_id: InstanceId,
        order: Order,
        sequence: Sequence,
        recorded: Vec<LifecycleEvent>,
    ) {
        let journal = Arc::new(Journal::new(self.store.clone(), instance_id, sequence));
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(last_recorded_status(&recorded));
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let mut ctx = LifecycleContext::new(
            instance_id,
            order,
            Arc::clone(&journal),
            self.activities.clone(),
            recorded,
            signal_rx,
            status_tx,
        );

        self.instances.write().await.insert(
            instance_id,
            Arc::new(InstanceRuntime {
                journal,
                signals: signal_tx,
                status: status_rx,
                outcome: outcome_rx,
            }),
        );

        let options = Arc::clone(&self.options);
        let instances = Arc::clone(&self.instances);
        let span = tracing::info_span!("lifecycle", %instance_id);

        tokio::spawn(
            async move {
                match order_lifecycle(&mut ctx, &options).await {
                    Ok(outcome) => {
                        outcome_tx.send_replace(Some(outcome));
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "lifecycle stopped before closing");
                    }
                }
                instances.write().await.remove(&instance_id);
            }
            .instrument(span),
        );
    }
}

/// The status an instance had reached when its history was written.
fn last_recorded_status(recorded: &[LifecycleEvent]) -> Option<OrderStatus> {
    recorded.iter().rev().find_map(|event| match event {
        LifecycleEvent::StatusChanged(data) => Some(data.status),
        LifecycleEvent::LifecycleClosed(data) => Some(data.status),
        _ => None,
    })
}

/// Handle to one lifecycle instance.
pub struct LifecycleHandle<S> {
    instance_id: InstanceId,
    host: LifecycleHost<S>,
}

impl<S> LifecycleHandle<S>
where
    S: HistoryStore + Clone + 'static,
{
    pub fn id(&self) -> InstanceId {
        self.instance_id
    }

    pub async fn status(&self) -> Result<Option<OrderStatus>> {
        self.host.query_status(self.instance_id).await
    }

    pub async fn signal(&self, signal: LifecycleSignal) -> Result<()> {
        self.host.signal(self.instance_id, signal).await
    }

    /// Blocks until the lifecycle reaches a terminal status.
    pub async fn result(&self) -> Result<LifecycleOutcome> {
        self.host.result(self.instance_id).await
    }
}
