// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for asynchronous, concurrent operations.
//
// Structure:
// - core/           - Shared health types
// - infrastructure/ - Concrete infrastructure actors (consumers, DLQ, Health, Coordinator)
//
// Note: Tracking rules live in domain::tracking and are called directly.
//       Actors are reserved for infrastructure concerns only.
//
// ============================================================================

// Private module declarations
mod core;
mod infrastructure;

// Re-export only what's needed in the public API
pub use infrastructure::{CoordinatorActor, GetHealthMonitor, Shutdown};

// Internal re-exports for use within the crate
pub(crate) use core::HealthStatus;
pub(crate) use infrastructure::{DlqActor, GetSystemHealth, HealthMonitorActor, SystemHealth};
