//! The order lifecycle state machine.
//!
//! ```text
//! UNSET --validate--> PLACED --pick--> PICKED --process--> ... --ship--> SHIPPED --deliver--> COMPLETED
//!   |                   |                         |
//!   +-> UNABLE_TO_      +--cancel--> CANCELLED    +-> UNABLE_TO_COMPLETE
//!       COMPLETE
//! ```

use std::time::Duration;

use domain::OrderStatus;
use history::HistoryStore;
use serde::{Deserialize, Serialize};

use crate::activities::ActivityKind;
use crate::error::Result;
use crate::instance::{LifecycleOutcome, StepFailure};
use crate::retry::RetryPolicy;
use crate::runtime::{LifecycleContext, SignalOutcome};
use crate::signals::LifecycleSignal;

/// Tunables for every lifecycle a host runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleOptions {
    pub validate_retry: RetryPolicy,
    pub process_retry: RetryPolicy,
    /// Optional expiry for the pick/cancel wait; expiry cancels the order.
    #[serde(default, with = "optional_secs")]
    pub pick_timeout: Option<Duration>,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            validate_retry: RetryPolicy::validation(),
            process_retry: RetryPolicy::processing(),
            pick_timeout: None,
        }
    }
}

/// Drives one order from submission to a terminal status.
///
/// Business failures end the lifecycle with a terminal outcome. `Err` is
/// reserved for runtime failures (history unavailable, history mismatch).
#[tracing::instrument(skip(ctx, options), fields(instance_id = %ctx.instance_id(), order_id = %ctx.order().id))]
pub async fn order_lifecycle<S: HistoryStore>(
    ctx: &mut LifecycleContext<S>,
    options: &LifecycleOptions,
) -> Result<LifecycleOutcome> {
    // 1. Validate
    if let Err(failure) = ctx
        .execute_activity(ActivityKind::Validate, &options.validate_retry)
        .await?
    {
        let failure = StepFailure::new(ActivityKind::Validate, failure.message);
        return ctx.close(OrderStatus::UnableToComplete, Some(failure)).await;
    }
    ctx.set_status(OrderStatus::Placed).await?;

    // 2. Pick or cancel, first one wins
    let decision = ctx
        .select_signal(
            &[LifecycleSignal::Pick, LifecycleSignal::Cancel],
            options.pick_timeout,
        )
        .await?;
    match decision {
        SignalOutcome::Received(LifecycleSignal::Pick) => {}
        SignalOutcome::Received(_) | SignalOutcome::Expired => {
            return ctx.close(OrderStatus::Cancelled, None).await;
        }
    }
    ctx.set_status(OrderStatus::Picked).await?;

    // 3. Process
    if let Err(failure) = ctx
        .execute_activity(ActivityKind::Process, &options.process_retry)
        .await?
    {
        let failure = StepFailure::new(ActivityKind::Process, failure.message);
        return ctx.close(OrderStatus::UnableToComplete, Some(failure)).await;
    }

    // 4. Ship, then deliver
    ctx.wait_signal(LifecycleSignal::Ship).await?;
    ctx.set_status(OrderStatus::Shipped).await?;

    ctx.wait_signal(LifecycleSignal::Deliver).await?;
    ctx.close(OrderStatus::Completed, None).await
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = LifecycleOptions::default();
        assert_eq!(options.validate_retry.maximum_attempts, 5);
        assert_eq!(options.process_retry.maximum_attempts, 4);
        assert!(options.pick_timeout.is_none());
    }

    #[test]
    fn test_options_serde() {
        let options = LifecycleOptions {
            pick_timeout: Some(Duration::from_secs(3600)),
            ..Default::default()
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["pick_timeout"], 3600);
        assert_eq!(json["validate_retry"]["initial_interval_ms"], 1000);

        let back: LifecycleOptions = serde_json::from_value(json).unwrap();
        assert_eq!(back, options);
    }
}
