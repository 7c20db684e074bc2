//! Order model and lifecycle status.

mod model;
mod status;
mod value_objects;

pub use model::{LineItem, Order};
pub use status::OrderStatus;
pub use value_objects::{OrderId, ProductId};
