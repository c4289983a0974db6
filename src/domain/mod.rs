// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure tracking rules plus the service that applies them. Persistence and
// transport are reached only through the `TrackingStore` and
// `StatusNotifier` ports.
//
// ============================================================================

pub mod tracking;
