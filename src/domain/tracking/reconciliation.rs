use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{StoreError, TrackingStore};

use super::aggregate::{OrderStateMachine, OrderTrackingRecord, StatusChange};
use super::errors::TrackingError;
use super::estimated_time::EstimatedTimeCalculator;
use super::events::{OrderCreatedEvent, PaymentEvent, TrackingEvent, TrackingUpdated};
use super::value_objects::{OrderId, OrderStatus};

// ============================================================================
// Reconciliation Service
// ============================================================================
//
// Orchestrates: Event → Record Store lookup → State Machine → Record Store
//
// Order and payment events arrive independently and at least once. Every
// read-then-write runs under a per-order lock, and the store's version
// check catches writers in other processes.
//
// ============================================================================

/// Outbound port for customer-facing status notifications.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify(&self, update: &TrackingUpdated) -> anyhow::Result<()>;
}

/// Drops every notification.
#[cfg(test)]
pub struct NoopNotifier;

#[cfg(test)]
#[async_trait]
impl StatusNotifier for NoopNotifier {
    async fn notify(&self, _update: &TrackingUpdated) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct ReconciliationService {
    store: Arc<dyn TrackingStore>,
    notifier: Arc<dyn StatusNotifier>,
    locks: OrderLocks,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn TrackingStore>, notifier: Arc<dyn StatusNotifier>) -> Self {
        Self {
            store,
            notifier,
            locks: OrderLocks::default(),
        }
    }

    /// Customers hear about an order once it can be picked up and once it
    /// is done.
    pub fn should_notify_customer(status: OrderStatus) -> bool {
        matches!(status, OrderStatus::Ready | OrderStatus::Completed)
    }

    /// Route a parsed event to its handler. Returns the record as it stands
    /// afterwards, or `None` for a payment on an order not seen yet.
    pub async fn apply(&self, event: &TrackingEvent) -> Result<Option<OrderTrackingRecord>, TrackingError> {
        match event {
            TrackingEvent::OrderCreated(e) => self.handle_order_created(e).await.map(Some),
            TrackingEvent::Payment(e) => self.handle_payment(e).await,
            TrackingEvent::StatusUpdated(e) => self.update_status(e.order_id, e.status).await.map(Some),
        }
    }

    /// Start tracking an order. Replays of the same order return the stored
    /// record untouched.
    pub async fn handle_order_created(
        &self,
        event: &OrderCreatedEvent,
    ) -> Result<OrderTrackingRecord, TrackingError> {
        let _guard = self.locks.acquire(event.order_id).await;

        if let Some(existing) = self.store.find_by_order_id(event.order_id).await? {
            tracing::debug!(
                order_id = event.order_id,
                status = %existing.status,
                "Order already tracked, ignoring replay"
            );
            return Ok(existing);
        }

        let estimated_time = event
            .estimated_time
            .unwrap_or_else(|| EstimatedTimeCalculator::by_items(&event.items));

        let record = OrderTrackingRecord::open(
            event.order_id,
            event.customer_id.clone(),
            event.items.clone(),
            Some(estimated_time),
        )?;

        match self.store.create(&record).await {
            Ok(created) => {
                tracing::info!(
                    order_id = created.order_id,
                    customer_id = %created.customer_id,
                    estimated_time = %estimated_time,
                    "📦 Order tracking started"
                );
                Ok(created)
            }
            Err(StoreError::DuplicateOrder(order_id)) => {
                // Another process created it between our read and insert
                tracing::warn!(order_id, "Lost order creation race, returning stored record");
                self.store
                    .find_by_order_id(order_id)
                    .await?
                    .ok_or(TrackingError::DuplicateOrder(order_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a payment outcome. A payment for an order we have not seen yet
    /// returns `None` and touches nothing; the caller decides when to retry.
    pub async fn handle_payment(
        &self,
        event: &PaymentEvent,
    ) -> Result<Option<OrderTrackingRecord>, TrackingError> {
        let guard = self.locks.acquire(event.order_id).await;

        let Some(mut record) = self.store.find_by_order_id(event.order_id).await? else {
            tracing::warn!(
                order_id = event.order_id,
                payment_id = %event.payment_id,
                "Payment for untracked order"
            );
            return Ok(None);
        };

        let change = OrderStateMachine::apply_payment(&mut record, event);
        let saved = self.store.update(&record).await?;

        tracing::info!(
            order_id = saved.order_id,
            payment_status = %saved.payment_status,
            status = %saved.status,
            "💳 Payment applied"
        );

        // The record is saved; a slow broker must not hold up this order
        drop(guard);
        self.after_change(&saved, change).await;
        Ok(Some(saved))
    }

    /// Kitchen-driven status change.
    pub async fn update_status(
        &self,
        order_id: OrderId,
        requested: OrderStatus,
    ) -> Result<OrderTrackingRecord, TrackingError> {
        let guard = self.locks.acquire(order_id).await;

        let mut record = self
            .store
            .find_by_order_id(order_id)
            .await?
            .ok_or(TrackingError::NotFound(order_id))?;

        let change = OrderStateMachine::transition(&mut record, requested)?;
        let saved = self.store.update(&record).await?;

        tracing::info!(
            order_id,
            from = %change.from,
            status = %change.to,
            "🍳 Order status updated"
        );

        drop(guard);
        self.after_change(&saved, Some(change)).await;
        Ok(saved)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn find(&self, order_id: OrderId) -> Result<Option<OrderTrackingRecord>, TrackingError> {
        Ok(self.store.find_by_order_id(order_id).await?)
    }

    /// Orders the kitchen is working on, oldest first.
    pub async fn kitchen_queue(&self) -> Result<Vec<OrderTrackingRecord>, TrackingError> {
        Ok(self.store.find_by_status(&OrderStatus::KITCHEN_QUEUE).await?)
    }

    /// A customer's orders, newest first.
    pub async fn customer_orders(&self, customer_id: &str) -> Result<Vec<OrderTrackingRecord>, TrackingError> {
        Ok(self.store.find_by_customer(customer_id).await?)
    }

    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<OrderTrackingRecord>, TrackingError> {
        Ok(self.store.list(offset, limit).await?)
    }

    pub async fn ping_store(&self) -> Result<(), TrackingError> {
        Ok(self.store.ping().await?)
    }

    async fn after_change(&self, record: &OrderTrackingRecord, change: Option<StatusChange>) {
        let Some(change) = change else {
            return;
        };

        if !Self::should_notify_customer(change.to) {
            return;
        }

        let update = TrackingUpdated::from_record(record);
        if let Err(e) = self.notifier.notify(&update).await {
            tracing::error!(
                order_id = record.order_id,
                status = %change.to,
                error = %e,
                "Failed to publish status notification"
            );
        }
    }
}

// ============================================================================
// Per-Order Locks
// ============================================================================

const LOCK_PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
struct OrderLocks {
    locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    async fn acquire(&self, order_id: OrderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;

            if locks.len() >= LOCK_PRUNE_THRESHOLD {
                // Only the map holds these, so nobody is waiting on them
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }

            locks.entry(order_id).or_default().clone()
        };

        lock.lock_owned().await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
