//! Externally visible lifecycle status.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// The status of an order as seen by status queries.
///
/// Transitions:
/// ```text
/// (unset) ──► PLACED ──┬──► PICKED ──► SHIPPED ──► COMPLETED
///    │                 └──► CANCELLED
///    └──► UNABLE_TO_COMPLETE ◄── (processing failure after PICKED)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Validation passed; waiting for the order to be picked or cancelled.
    Placed,

    /// The order was picked; processing runs next.
    Picked,

    /// The order left the warehouse.
    Shipped,

    /// The order was delivered (terminal state).
    Completed,

    /// The order was cancelled before it was picked (terminal state).
    Cancelled,

    /// Validation or processing failed (terminal state).
    UnableToComplete,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Placed,
        OrderStatus::Picked,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::UnableToComplete,
    ];

    /// Returns true if this status ends the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::UnableToComplete
        )
    }

    /// Returns true if `value` names a known status.
    pub fn is_valid(value: &str) -> bool {
        value.parse::<OrderStatus>().is_ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Picked => "PICKED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::UnableToComplete => "UNABLE_TO_COMPLETE",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidStatus(s.to_string()))
    }
}
