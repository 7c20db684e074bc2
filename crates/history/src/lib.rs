//! Append-only history log for lifecycle instances.
//!
//! Every decision a lifecycle instance makes (activity outcomes, consumed
//! signals, status changes) is appended here before it takes effect, so an
//! instance can be rebuilt by replaying its records after a restart.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::InstanceId;
pub use error::{HistoryError, Result};
pub use memory::InMemoryHistoryStore;
pub use postgres::PostgresHistoryStore;
pub use record::{HistoryRecord, HistoryRecordBuilder, RecordId, Sequence};
pub use store::{HistoryStore, HistoryStoreExt};
