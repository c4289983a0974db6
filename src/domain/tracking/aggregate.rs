use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::errors::TrackingError;
use super::estimated_time::EstimatedTime;
use super::events::PaymentEvent;
use super::value_objects::{LineItem, OrderId, OrderStatus, PaymentStatus};

// ============================================================================
// Order Tracking Record - Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTrackingRecord {
    // Identity
    pub order_id: OrderId,
    pub customer_id: String,

    // Current State
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    items: Vec<LineItem>,
    pub amount_paid: Option<Decimal>,
    pub estimated_time: Option<EstimatedTime>,

    // Audit Trail
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every successful update.
    pub version: i64,
}

impl OrderTrackingRecord {
    /// Open tracking for a freshly created order: `Received`, payment
    /// `Pending`, version 0.
    pub fn open(
        order_id: OrderId,
        customer_id: impl Into<String>,
        items: Vec<LineItem>,
        estimated_time: Option<EstimatedTime>,
    ) -> Result<Self, TrackingError> {
        if order_id <= 0 {
            return Err(TrackingError::InvalidOrderId(order_id));
        }

        if items.is_empty() {
            return Err(TrackingError::EmptyItems);
        }

        Ok(Self {
            order_id,
            customer_id: customer_id.into(),
            status: OrderStatus::Received,
            payment_status: PaymentStatus::Pending,
            items,
            amount_paid: None,
            estimated_time,
            updated_at: Utc::now(),
            version: 0,
        })
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }
}

/// Persisted form of a record, checked back into an aggregate on load.
#[derive(Debug, Clone)]
pub struct RecordSnapshot {
    pub order_id: OrderId,
    pub customer_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub items: Vec<LineItem>,
    pub amount_paid: Option<Decimal>,
    pub estimated_time: Option<EstimatedTime>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<RecordSnapshot> for OrderTrackingRecord {
    type Error = TrackingError;

    fn try_from(snapshot: RecordSnapshot) -> Result<Self, Self::Error> {
        if snapshot.order_id <= 0 {
            return Err(TrackingError::InvalidOrderId(snapshot.order_id));
        }

        if snapshot.items.is_empty() {
            return Err(TrackingError::EmptyItems);
        }

        Ok(Self {
            order_id: snapshot.order_id,
            customer_id: snapshot.customer_id,
            status: snapshot.status,
            payment_status: snapshot.payment_status,
            items: snapshot.items,
            amount_paid: snapshot.amount_paid,
            estimated_time: snapshot.estimated_time,
            updated_at: snapshot.updated_at,
            version: snapshot.version,
        })
    }
}

// ============================================================================
// State Machine
// ============================================================================

/// Order status movement caused by a transition or a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

pub struct OrderStateMachine;

impl OrderStateMachine {
    pub fn can_transition(current: OrderStatus, candidate: OrderStatus) -> bool {
        current.can_transition_to(candidate)
    }

    pub fn next_valid_states(current: OrderStatus) -> &'static [OrderStatus] {
        current.next_states()
    }

    pub fn should_update_from_payment(status: PaymentStatus) -> bool {
        status.triggers_order_update()
    }

    /// Move `record` to `requested`. On failure the record is untouched.
    pub fn transition(
        record: &mut OrderTrackingRecord,
        requested: OrderStatus,
    ) -> Result<StatusChange, TrackingError> {
        let from = record.status;

        if !Self::can_transition(from, requested) {
            return Err(TrackingError::InvalidTransition {
                from,
                to: requested,
            });
        }

        record.status = requested;
        record.updated_at = Utc::now();

        Ok(StatusChange {
            from,
            to: requested,
        })
    }

    /// Record the payment outcome. A confirmed payment on a `Received` order
    /// sends it to the kitchen; nothing else touches the order status.
    pub fn apply_payment(
        record: &mut OrderTrackingRecord,
        payment: &PaymentEvent,
    ) -> Option<StatusChange> {
        record.payment_status = payment.status;
        record.updated_at = Utc::now();

        if !Self::should_update_from_payment(payment.status) {
            return None;
        }

        if payment.amount.is_some() {
            record.amount_paid = payment.amount;
        }

        if record.status != OrderStatus::Received {
            return None;
        }

        let from = record.status;
        record.status = OrderStatus::InPreparation;

        Some(StatusChange {
            from,
            to: OrderStatus::InPreparation,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
