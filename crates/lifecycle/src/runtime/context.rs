//! The execution context a lifecycle state machine runs against.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use common::InstanceId;
use domain::{Order, OrderStatus};
use history::HistoryStore;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::journal::Journal;
use crate::activities::{ActivityFailure, ActivityKind, OrderActivities};
use crate::error::{LifecycleError, Result};
use crate::events::LifecycleEvent;
use crate::instance::{LifecycleOutcome, StepFailure};
use crate::retry::RetryPolicy;
use crate::signals::LifecycleSignal;

/// How a signal wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Received(LifecycleSignal),
    /// The wait's timeout elapsed first.
    Expired,
}

/// Gateway between a lifecycle state machine and the outside world.
///
/// Every decision point (activity outcome, consumed signal, status change)
/// first looks for a recorded decision in the replay queue. Only when the
/// queue is exhausted does the context act live and append the decision to
/// the instance history.
pub struct LifecycleContext<S> {
    instance_id: InstanceId,
    order: Order,
    journal: Arc<Journal<S>>,
    activities: OrderActivities,
    /// Recorded decisions not yet reached by the state machine.
    replay: VecDeque<LifecycleEvent>,
    /// Attempts already spent on an unfinished activity, with the last failure.
    failed_attempts: HashMap<ActivityKind, (u32, ActivityFailure)>,
    /// Received, unconsumed signals in arrival order.
    pending: VecDeque<LifecycleSignal>,
    inbox: mpsc::UnboundedReceiver<LifecycleSignal>,
    status: watch::Sender<Option<OrderStatus>>,
}

impl<S: HistoryStore> LifecycleContext<S> {
    pub(crate) fn new(
        instance_id: InstanceId,
        order: Order,
        journal: Arc<Journal<S>>,
        activities: OrderActivities,
        recorded: Vec<LifecycleEvent>,
        inbox: mpsc::UnboundedReceiver<LifecycleSignal>,
        status: watch::Sender<Option<OrderStatus>>,
    ) -> Self {
        let mut replay = VecDeque::new();
        let mut failed_attempts = HashMap::new();
        let mut pending = VecDeque::new();

        for event in recorded {
            match event {
                LifecycleEvent::LifecycleStarted(_) => {}
                LifecycleEvent::ActivityAttemptFailed(data) => {
                    let failure = ActivityFailure {
                        message: data.error,
                        retryable: data.retryable,
                    };
                    failed_attempts.insert(data.activity, (data.attempt, failure));
                }
                LifecycleEvent::SignalReceived(data) => pending.push_back(data.signal),
                decision => replay.push_back(decision),
            }
        }

        Self {
            instance_id,
            order,
            journal,
            activities,
            replay,
            failed_attempts,
            pending,
            inbox,
            status,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    /// Returns the live status, or None before the first transition.
    pub fn status(&self) -> Option<OrderStatus> {
        *self.status.borrow()
    }

    /// Runs an activity under a retry policy.
    ///
    /// The outer result carries runtime failures. The inner result is the
    /// activity's own outcome once retries are exhausted or a non-retryable
    /// failure occurs.
    pub async fn execute_activity(
        &mut self,
        kind: ActivityKind,
        policy: &RetryPolicy,
    ) -> Result<std::result::Result<Option<String>, ActivityFailure>> {
        if let Some(event) = self.replay.pop_front() {
            self.failed_attempts.remove(&kind);
            return match event {
                LifecycleEvent::ActivityCompleted(data) if data.activity == kind => {
                    tracing::debug!(activity = %kind, "replayed activity completion");
                    Ok(Ok(data.result))
                }
                LifecycleEvent::ActivityFailed(data) if data.activity == kind => {
                    tracing::debug!(activity = %kind, "replayed activity failure");
                    Ok(Err(ActivityFailure {
                        message: data.error,
                        retryable: false,
                    }))
                }
                other => Err(self.mismatch("ActivityCompleted or ActivityFailed", &other)),
            };
        }

        let (mut attempt, mut last_failure) = match self.failed_attempts.remove(&kind) {
            Some((attempt, failure)) => (attempt, Some(failure)),
            None => (0, None),
        };

        loop {
            if let Some(failure) = last_failure.take() {
                if !failure.retryable || !policy.allows_attempt(attempt + 1) {
                    tracing::warn!(
                        activity = %kind,
                        attempts = attempt,
                        error = %failure.message,
                        retryable = failure.retryable,
                        "activity failed"
                    );
                    self.journal
                        .record(&LifecycleEvent::activity_failed(kind, &failure.message))
                        .await?;
                    return Ok(Err(failure));
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::info!(
                    activity = %kind,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure.message,
                    "retrying activity"
                );
                tokio::time::sleep(delay).await;
            }

            attempt += 1;
            let started = std::time::Instant::now();
            let outcome = self.activities.run(kind, &self.order).await;
            metrics::histogram!("activity_duration_seconds", "activity" => kind.as_str())
                .record(started.elapsed().as_secs_f64());

            match outcome {
                Ok(result) => {
                    metrics::counter!(
                        "activity_attempts_total",
                        "activity" => kind.as_str(),
                        "outcome" => "success"
                    )
                    .increment(1);
                    self.journal
                        .record(&LifecycleEvent::activity_completed(kind, result.clone()))
                        .await?;
                    tracing::info!(activity = %kind, attempt, "activity completed");
                    return Ok(Ok(result));
                }
                Err(failure) => {
                    metrics::counter!(
                        "activity_attempts_total",
                        "activity" => kind.as_str(),
                        "outcome" => "failure"
                    )
                    .increment(1);
                    self.journal
                        .record(&LifecycleEvent::activity_attempt_failed(
                            kind,
                            attempt,
                            &failure.message,
                            failure.retryable,
                        ))
                        .await?;
                    last_failure = Some(failure);
                }
            }
        }
    }

    /// Waits until one of `signals` is available and consumes it.
    ///
    /// A buffered signal is taken first, earliest arrival wins. With a
    /// timeout, the wait ends with [`SignalOutcome::Expired`] once it elapses.
    pub async fn select_signal(
        &mut self,
        signals: &[LifecycleSignal],
        timeout: Option<Duration>,
    ) -> Result<SignalOutcome> {
        if let Some(event) = self.replay.pop_front() {
            return match event {
                LifecycleEvent::SignalConsumed(data) if signals.contains(&data.signal) => {
                    let signal = data.signal;
                    match self.take_pending(signal) {
                        Some(_) => Ok(SignalOutcome::Received(signal)),
                        None => Err(self.mismatch(
                            "SignalReceived",
                            &LifecycleEvent::SignalConsumed(data),
                        )),
                    }
                }
                LifecycleEvent::WaitExpired(_) => Ok(SignalOutcome::Expired),
                other => Err(self.mismatch("SignalConsumed or WaitExpired", &other)),
            };
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        loop {
            self.drain_inbox();

            if let Some(position) = self.pending.iter().position(|s| signals.contains(s)) {
                if let Some(signal) = self.pending.remove(position) {
                    self.journal
                        .record(&LifecycleEvent::signal_consumed(signal))
                        .await?;
                    tracing::info!(%signal, "signal consumed");
                    return Ok(SignalOutcome::Received(signal));
                }
            }

            let received = match deadline {
                Some(deadline) => tokio::select! {
                    received = self.inbox.recv() => Some(received),
                    _ = tokio::time::sleep_until(deadline) => None,
                },
                None => Some(self.inbox.recv().await),
            };

            match received {
                Some(Some(signal)) => self.pending.push_back(signal),
                Some(None) => return Err(LifecycleError::InboxClosed(self.instance_id)),
                None => {
                    self.journal
                        .record(&LifecycleEvent::wait_expired(signals))
                        .await?;
                    tracing::info!(?signals, "signal wait expired");
                    return Ok(SignalOutcome::Expired);
                }
            }
        }
    }

    /// Waits for one specific signal, with no timeout.
    pub async fn wait_signal(&mut self, signal: LifecycleSignal) -> Result<()> {
        match self.select_signal(&[signal], None).await? {
            SignalOutcome::Received(_) => Ok(()),
            SignalOutcome::Expired => Err(self.mismatch(
                "SignalConsumed",
                &LifecycleEvent::wait_expired(&[signal]),
            )),
        }
    }

    /// Moves the instance to a new status and publishes it to queriers.
    pub async fn set_status(&mut self, status: OrderStatus) -> Result<()> {
        match self.replay.pop_front() {
            Some(LifecycleEvent::StatusChanged(data)) if data.status == status => {
                // A later recorded status is already published.
                if self
                    .replay
                    .iter()
                    .any(|event| matches!(event, LifecycleEvent::StatusChanged(_)))
                {
                    return Ok(());
                }
            }
            Some(other) => return Err(self.mismatch("StatusChanged", &other)),
            None => {
                self.journal
                    .record(&LifecycleEvent::status_changed(status))
                    .await?;
                metrics::counter!("lifecycle_transitions_total", "status" => status.as_str())
                    .increment(1);
                tracing::info!(%status, "status changed");
            }
        }

        self.status.send_replace(Some(status));
        Ok(())
    }

    /// Ends the instance with a terminal status.
    pub async fn close(
        &mut self,
        status: OrderStatus,
        failure: Option<StepFailure>,
    ) -> Result<LifecycleOutcome> {
        match self.replay.pop_front() {
            Some(LifecycleEvent::LifecycleClosed(data)) if data.status == status => {}
            Some(other) => return Err(self.mismatch("LifecycleClosed", &other)),
            None => {
                self.drain_inbox();
                if !self.pending.is_empty() {
                    tracing::warn!(
                        unconsumed = ?self.pending,
                        "lifecycle closing with unconsumed signals"
                    );
                }

                self.journal
                    .record(&LifecycleEvent::lifecycle_closed(status, failure.clone()))
                    .await?;
                metrics::counter!("lifecycle_closed_total", "status" => status.as_str())
                    .increment(1);
                match &failure {
                    Some(failure) => tracing::warn!(%status, %failure, "lifecycle closed"),
                    None => tracing::info!(%status, "lifecycle closed"),
                }
            }
        }

        self.status.send_replace(Some(status));
        Ok(LifecycleOutcome { status, failure })
    }

    fn drain_inbox(&mut self) {
        while let Ok(signal) = self.inbox.try_recv() {
            self.pending.push_back(signal);
        }
    }

    fn take_pending(&mut self, signal: LifecycleSignal) -> Option<LifecycleSignal> {
        let position = self.pending.iter().position(|s| *s == signal)?;
        self.pending.remove(position)
    }

    fn mismatch(&self, expected: &'static str, found: &LifecycleEvent) -> LifecycleError {
        tracing::error!(expected, found = %found.describe(), "history does not match lifecycle");
        LifecycleError::HistoryMismatch {
            instance_id: self.instance_id,
            expected,
            found: found.describe(),
        }
    }
}
