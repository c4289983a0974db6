// ============================================================================
// Record Store - Persistence Port for Order Tracking Records
// ============================================================================
//
// One row per order, keyed by `order_id`. Two implementations:
// - `PostgresTrackingStore` for the running service
// - `InMemoryTrackingStore` for tests
//
// Both enforce the same concurrency contract: `create` fails on a duplicate
// order id, and `update` only succeeds when the caller holds the current
// `version`.
//
// ============================================================================

use async_trait::async_trait;

use crate::domain::tracking::{OrderId, OrderStatus, OrderTrackingRecord};
use crate::utils::IsTransient;

#[cfg(test)]
mod memory;
mod postgres;

#[cfg(test)]
pub use memory::InMemoryTrackingStore;
pub use postgres::PostgresTrackingStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order {0} is already tracked")]
    DuplicateOrder(OrderId),

    #[error("Order {0} is not tracked")]
    NotFound(OrderId),

    #[error("Order {order_id} was modified concurrently (expected version {expected})")]
    VersionConflict { order_id: OrderId, expected: i64 },

    #[error("Stored record for order {order_id} is unreadable: {reason}")]
    Corrupt { order_id: OrderId, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            // A fresh read and replay will see the newer version
            StoreError::VersionConflict { .. } => true,
            StoreError::Database(e) => !matches!(
                e,
                sqlx::Error::RowNotFound
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::ColumnDecode { .. }
                    | sqlx::Error::TypeNotFound { .. }
            ),
            _ => false,
        }
    }
}

#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Insert a new record. Fails with `DuplicateOrder` if the id exists.
    async fn create(&self, record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError>;

    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<OrderTrackingRecord>, StoreError>;

    /// Most recently updated first.
    async fn find_by_customer(&self, customer_id: &str) -> Result<Vec<OrderTrackingRecord>, StoreError>;

    /// Oldest update first, ties broken by order id.
    async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderTrackingRecord>, StoreError>;

    /// Persist `record` if its `version` is still current. The returned
    /// record carries the bumped version.
    async fn update(&self, record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError>;

    /// Page through all records by ascending order id.
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<OrderTrackingRecord>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
