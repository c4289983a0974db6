// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// Infrastructure actors for system concerns:
// - Topic consumption into the tracking service
// - Dead letter queue
// - Health monitoring
// - Coordination and supervision
//
// ============================================================================

// Private module declarations
mod coordinator;
mod dlq;
mod event_processor;
mod health_monitor;

// Re-export for public API
pub use coordinator::{CoordinatorActor, GetHealthMonitor, Shutdown};
pub use dlq::{AddToDlq, DlqActor};
pub use event_processor::{EventDispatcher, EventProcessor};
pub use health_monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
