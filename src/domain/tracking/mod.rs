// ============================================================================
// Tracking Domain - Order Fulfillment and Payment Progress
// ============================================================================
//
// This module contains ALL tracking-specific code:
// - Value objects (OrderStatus, PaymentStatus, LineItem)
// - Estimated preparation time and its calculator
// - Events (inbound order/payment/status events, outbound notifications)
// - Errors (TrackingError enum)
// - Aggregate (OrderTrackingRecord and the OrderStateMachine)
// - Reconciliation service (event and kitchen command orchestration)
//
// ============================================================================

pub mod value_objects;
pub mod estimated_time;
pub mod events;
pub mod errors;
pub mod aggregate;
pub mod reconciliation;

// Re-export for convenience
pub use value_objects::*;
pub use estimated_time::*;
pub use events::*;
pub use errors::*;
pub use aggregate::*;
pub use reconciliation::*;
