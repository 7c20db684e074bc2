//! Domain layer for the order lifecycle.
//!
//! This crate provides:
//! - The order data model (`Order`, `LineItem`) submitted to a lifecycle
//! - `OrderStatus`, the externally visible lifecycle status
//! - Aggregate and DomainEvent traits used to fold instance history into state

pub mod aggregate;
pub mod error;
pub mod order;

pub use aggregate::{Aggregate, DomainEvent};
pub use error::DomainError;
pub use order::{LineItem, Order, OrderId, OrderStatus, ProductId};
