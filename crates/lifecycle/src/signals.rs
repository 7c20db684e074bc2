//! External signals and the status query name.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the parameterless query that returns the current `OrderStatus`.
pub const GET_ORDER_STATUS_QUERY: &str = "GetOrderStatus";

/// Payload-free events delivered to a running lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// The order was picked in the warehouse.
    Pick,
    /// The order was handed to the carrier.
    Ship,
    /// The order reached the customer.
    Deliver,
    /// The customer cancelled the order.
    Cancel,
}

impl LifecycleSignal {
    pub const ALL: [LifecycleSignal; 4] = [
        LifecycleSignal::Pick,
        LifecycleSignal::Ship,
        LifecycleSignal::Deliver,
        LifecycleSignal::Cancel,
    ];

    /// Returns the signal channel name.
    pub fn channel_name(&self) -> &'static str {
        match self {
            LifecycleSignal::Pick => "pickOrder",
            LifecycleSignal::Ship => "shipOrder",
            LifecycleSignal::Deliver => "markOrderAsDelivered",
            LifecycleSignal::Cancel => "cancelOrder",
        }
    }

    /// Returns the short name used by the API and CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleSignal::Pick => "pick",
            LifecycleSignal::Ship => "ship",
            LifecycleSignal::Deliver => "deliver",
            LifecycleSignal::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for LifecycleSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown signal name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal: {0:?}")]
pub struct UnknownSignal(pub String);

impl FromStr for LifecycleSignal {
    type Err = UnknownSignal;

    /// Accepts the short name (`pick`) or the channel name (`pickOrder`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LifecycleSignal::ALL
            .into_iter()
            .find(|signal| signal.as_str() == s || signal.channel_name() == s)
            .ok_or_else(|| UnknownSignal(s.to_string()))
    }
}
