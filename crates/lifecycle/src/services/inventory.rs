//! Inventory gateway trait and in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use domain::ProductId;
use thiserror::Error;

/// Answer to an availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    /// Optional explanation from the inventory service.
    pub message: Option<String>,
}

impl Availability {
    pub fn available() -> Self {
        Self {
            available: true,
            message: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: Some(message.into()),
        }
    }
}

/// Failure to obtain an availability answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The request never produced a response (connect, timeout, I/O).
    #[error("failed to reach inventory service: {0}")]
    Transport(String),

    /// The service answered 500 or 503.
    #[error("inventory service unavailable (status: {status})")]
    Unavailable { status: u16 },

    /// The service rejected the request as invalid (400).
    #[error("invalid inventory request: {0}")]
    InvalidRequest(String),

    /// The service answered with a status code outside the contract.
    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),

    /// A 200 response carried a body that could not be decoded.
    #[error("failed to decode inventory response: {0}")]
    Decode(String),
}

impl InventoryError {
    /// Only an explicit invalid-request answer is permanent.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, InventoryError::InvalidRequest(_))
    }
}

/// Client for the remote inventory service.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Asks whether `quantity` units of `product_id` are available.
    async fn check_availability(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Availability, InventoryError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    stock: HashMap<ProductId, i32>,
    default_stock: Option<i32>,
    scripted_failures: VecDeque<InventoryError>,
    calls: Vec<(ProductId, i32)>,
}

/// In-memory inventory gateway.
///
/// Answers from a stock table. Queued failures are returned, oldest first,
/// before the stock table is consulted, which lets tests simulate an outage
/// that heals after a number of calls.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryGateway {
    state: Arc<Mutex<InMemoryInventoryState>>,
}

impl InMemoryInventoryGateway {
    /// Creates a gateway where every product is out of stock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway that stocks `quantity` units of any unlisted product.
    pub fn with_default_stock(quantity: i32) -> Self {
        let gateway = Self::default();
        gateway.lock().default_stock = Some(quantity);
        gateway
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryInventoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the stock level of one product.
    pub fn set_stock(&self, product_id: ProductId, quantity: i32) {
        self.lock().stock.insert(product_id, quantity);
    }

    /// Queues a failure for the next call.
    pub fn push_failure(&self, error: InventoryError) {
        self.lock().scripted_failures.push_back(error);
    }

    /// Queues `count` transient 503 failures.
    pub fn fail_transiently(&self, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            state
                .scripted_failures
                .push_back(InventoryError::Unavailable { status: 503 });
        }
    }

    /// Returns every (product, quantity) pair checked so far.
    pub fn calls(&self) -> Vec<(ProductId, i32)> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventoryGateway {
    async fn check_availability(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<Availability, InventoryError> {
        let mut state = self.lock();
        state.calls.push((product_id, quantity));

        if let Some(error) = state.scripted_failures.pop_front() {
            return Err(error);
        }

        let on_hand = state
            .stock
            .get(&product_id)
            .copied()
            .or(state.default_stock)
            .unwrap_or(0);

        if on_hand >= quantity {
            Ok(Availability::available())
        } else {
            Ok(Availability::unavailable(format!(
                "only {on_hand} units of {product_id} on hand"
            )))
        }
    }
}
