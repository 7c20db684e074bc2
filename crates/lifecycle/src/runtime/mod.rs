//! Durable execution runtime for lifecycle instances.

mod context;
mod host;
mod journal;

pub use context::{LifecycleContext, SignalOutcome};
pub use host::{LifecycleHandle, LifecycleHost};
