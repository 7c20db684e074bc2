//! Durable order lifecycle.
//!
//! An order moves through a signal-driven state machine:
//! 1. Validate the order (structure + inventory availability)
//! 2. Wait for the order to be picked, or cancelled
//! 3. Process the order
//! 4. Wait for shipment, then delivery
//!
//! The state machine in [`workflow`] only talks to the outside world through a
//! [`LifecycleContext`]. The context records every decision in the instance
//! history and replays recorded decisions after a restart, which is what lets
//! a [`LifecycleHost`] resume instances across process restarts.

pub mod activities;
pub mod error;
pub mod events;
pub mod instance;
pub mod retry;
pub mod runtime;
pub mod services;
pub mod signals;
pub mod workflow;

pub use activities::{
    AcceptingProcessor, ActivityFailure, ActivityKind, OrderActivities, OrderProcessor,
    OrderValidator, ProcessingError, UnimplementedProcessor, ValidationError,
};
pub use error::{LifecycleError, Result};
pub use events::LifecycleEvent;
pub use instance::{LifecycleInstance, LifecycleOutcome, StepFailure};
pub use retry::RetryPolicy;
pub use runtime::{LifecycleContext, LifecycleHandle, LifecycleHost, SignalOutcome};
pub use services::{
    Availability, HttpInventoryGateway, InMemoryInventoryGateway, InventoryError,
    InventoryGateway,
};
pub use signals::{GET_ORDER_STATUS_QUERY, LifecycleSignal};
pub use workflow::{LifecycleOptions, order_lifecycle};
