//! Order validation activity.

use std::sync::Arc;

use domain::{Order, ProductId};
use thiserror::Error;

use crate::services::{InventoryError, InventoryGateway};

/// Reasons an order fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("order must have a valid order ID")]
    MissingOrderId,

    #[error("order must have at least one item")]
    EmptyOrderItems,

    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },

    /// The inventory service answered that the product is not available.
    #[error("insufficient inventory for product {0}")]
    InsufficientInventory(ProductId),

    /// The inventory service rejected the check itself.
    #[error("inventory check rejected for product {product_id}: {message}")]
    InventoryRejected {
        product_id: ProductId,
        message: String,
    },

    /// The inventory service could not be reached; worth retrying.
    #[error("failed to check inventory for product {product_id}: {source}")]
    InventoryUnavailable {
        product_id: ProductId,
        #[source]
        source: InventoryError,
    },
}

impl ValidationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ValidationError::InventoryUnavailable { .. })
    }
}

/// Checks an order's structure and the availability of every line item.
pub struct OrderValidator {
    gateway: Arc<dyn InventoryGateway>,
}

impl OrderValidator {
    pub fn new(gateway: Arc<dyn InventoryGateway>) -> Self {
        Self { gateway }
    }

    /// Validates an order.
    ///
    /// Stops at the first failing line item. The only side effects are the
    /// read-only inventory queries.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id, items = order.line_items.len()))]
    pub async fn validate(&self, order: &Order) -> Result<(), ValidationError> {
        if order.id.is_zero() {
            return Err(ValidationError::MissingOrderId);
        }

        if !order.has_items() {
            return Err(ValidationError::EmptyOrderItems);
        }

        for item in &order.line_items {
            if item.quantity <= 0 {
                return Err(ValidationError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }

            let availability = self
                .gateway
                .check_availability(item.product_id, item.quantity)
                .await
                .map_err(|source| match source {
                    InventoryError::InvalidRequest(message) => ValidationError::InventoryRejected {
                        product_id: item.product_id,
                        message,
                    },
                    source => ValidationError::InventoryUnavailable {
                        product_id: item.product_id,
                        source,
                    },
                })?;

            if !availability.available {
                tracing::info!(
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    reason = availability.message.as_deref().unwrap_or(""),
                    "insufficient inventory"
                );
                return Err(ValidationError::InsufficientInventory(item.product_id));
            }
        }

        Ok(())
    }
}
