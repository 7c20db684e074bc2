//! Inventory gateway contract and implementations.

pub mod http_inventory;
pub mod inventory;

pub use http_inventory::{CheckInventoryRequest, CheckInventoryResponse, HttpInventoryGateway};
pub use inventory::{Availability, InMemoryInventoryGateway, InventoryError, InventoryGateway};
