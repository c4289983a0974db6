use super::value_objects::{OrderId, OrderStatus};
use crate::store::StoreError;
use crate::utils::IsTransient;

// ============================================================================
// Tracking Errors
// ============================================================================
//
// Domain failures are permanent: redelivering the same message produces the
// same answer. Only `Store` can be transient.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Tracking record not found for order {0}")]
    NotFound(OrderId),

    #[error("Invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Tracking record already exists for order {0}")]
    DuplicateOrder(OrderId),

    #[error("Order must have at least one item")]
    EmptyItems,

    #[error("Order id must be positive, got {0}")]
    InvalidOrderId(i64),

    #[error("Product id must be positive, got {0}")]
    InvalidProductId(i64),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    #[error("Unknown order status: {0}")]
    InvalidOrderStatus(String),

    #[error("Unknown payment status: {0}")]
    InvalidPaymentStatus(String),

    #[error("Invalid estimated time '{0}', expected HH:MM:SS")]
    InvalidEstimatedTime(String),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Malformed event payload: {0}")]
    MalformedEvent(String),

    #[error("Storage failure: {0}")]
    Store(StoreError),
}

impl TrackingError {
    /// Stable machine-readable code exposed to API clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            TrackingError::NotFound(_) => "TRACKING_NOT_FOUND",
            TrackingError::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            TrackingError::DuplicateOrder(_) => "DUPLICATE_ORDER",
            TrackingError::EmptyItems
            | TrackingError::InvalidOrderId(_)
            | TrackingError::InvalidProductId(_)
            | TrackingError::InvalidQuantity(_)
            | TrackingError::InvalidOrderStatus(_)
            | TrackingError::InvalidPaymentStatus(_)
            | TrackingError::InvalidEstimatedTime(_) => "VALIDATION_ERROR",
            TrackingError::UnknownEventType(_) | TrackingError::MalformedEvent(_) => {
                "EVENT_PROCESSING_ERROR"
            }
            TrackingError::Store(_) => "DATABASE_CONNECTION_ERROR",
        }
    }

    /// Variant name, used as the `error_type` of API error bodies and as a
    /// metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackingError::NotFound(_) => "NotFound",
            TrackingError::InvalidTransition { .. } => "InvalidTransition",
            TrackingError::DuplicateOrder(_) => "DuplicateOrder",
            TrackingError::EmptyItems => "EmptyItems",
            TrackingError::InvalidOrderId(_) => "InvalidOrderId",
            TrackingError::InvalidProductId(_) => "InvalidProductId",
            TrackingError::InvalidQuantity(_) => "InvalidQuantity",
            TrackingError::InvalidOrderStatus(_) => "InvalidOrderStatus",
            TrackingError::InvalidPaymentStatus(_) => "InvalidPaymentStatus",
            TrackingError::InvalidEstimatedTime(_) => "InvalidEstimatedTime",
            TrackingError::UnknownEventType(_) => "UnknownEventType",
            TrackingError::MalformedEvent(_) => "MalformedEvent",
            TrackingError::Store(_) => "Store",
        }
    }
}

impl From<StoreError> for TrackingError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateOrder(order_id) => TrackingError::DuplicateOrder(order_id),
            StoreError::NotFound(order_id) => TrackingError::NotFound(order_id),
            other => TrackingError::Store(other),
        }
    }
}

impl IsTransient for TrackingError {
    fn is_transient(&self) -> bool {
        match self {
            TrackingError::Store(error) => error.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_domain_errors() {
        assert!(matches!(
            TrackingError::from(StoreError::DuplicateOrder(4)),
            TrackingError::DuplicateOrder(4)
        ));
        assert!(matches!(
            TrackingError::from(StoreError::NotFound(4)),
            TrackingError::NotFound(4)
        ));

        let conflict = TrackingError::from(StoreError::VersionConflict {
            order_id: 4,
            expected: 2,
        });
        assert!(matches!(conflict, TrackingError::Store(_)));
        assert!(conflict.is_transient());
    }

    #[test]
    fn test_domain_errors_are_permanent() {
        let errors = [
            TrackingError::NotFound(1),
            TrackingError::InvalidTransition {
                from: OrderStatus::Completed,
                to: OrderStatus::Ready,
            },
            TrackingError::EmptyItems,
            TrackingError::UnknownEventType("order_shipped".to_string()),
        ];

        for error in errors {
            assert!(!error.is_transient(), "{error}");
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(TrackingError::NotFound(1).error_code(), "TRACKING_NOT_FOUND");
        assert_eq!(TrackingError::DuplicateOrder(1).error_code(), "DUPLICATE_ORDER");
        assert_eq!(
            TrackingError::MalformedEvent("x".into()).error_code(),
            "EVENT_PROCESSING_ERROR"
        );
        assert_eq!(
            TrackingError::InvalidTransition {
                from: OrderStatus::Received,
                to: OrderStatus::Ready
            }
            .to_string(),
            "Invalid transition from 'Recebido' to 'Pronto'"
        );
    }
}
