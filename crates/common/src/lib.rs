//! Shared identifier types.

pub mod types;

pub use types::{InstanceId, ParseInstanceIdError};
