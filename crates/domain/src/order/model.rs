//! Order and line item.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::{OrderId, ProductId};

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,

    /// Quantity ordered; expected to be greater than zero.
    pub quantity: i32,

    /// Exact unit price.
    pub price_per_item: Decimal,
}

impl LineItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: i32, price_per_item: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            price_per_item,
        }
    }

    /// Returns quantity * unit price.
    pub fn total_price(&self) -> Decimal {
        self.price_per_item * Decimal::from(self.quantity)
    }
}

/// An order submitted to a lifecycle.
///
/// Missing fields deserialize to their zero values so that malformed
/// submissions reach validation and fail there with a precise error.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub id: OrderId,

    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl Order {
    pub fn new(id: impl Into<OrderId>, line_items: Vec<LineItem>) -> Self {
        Self {
            id: id.into(),
            line_items,
        }
    }

    pub fn has_items(&self) -> bool {
        !self.line_items.is_empty()
    }

    /// Returns the sum of all line totals.
    pub fn total_amount(&self) -> Decimal {
        self.line_items.iter().map(LineItem::total_price).sum()
    }
}
