// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers the consumer side of the service:
// - Event processing (throughput, latency, failures by reason)
// - Retry attempts and outcomes
// - Dead Letter Queue volume
// - Notification circuit breaker state
// - Aggregated service health
//
// Served in Prometheus text format on the metrics port at /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Event Processing Metrics
    pub events_processed: IntCounterVec,
    pub events_failed: IntCounterVec,
    pub processing_duration: HistogramVec,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_outcomes: IntCounterVec,

    // DLQ Metrics
    pub dlq_messages_total: IntCounter,
    pub dlq_messages_by_event_type: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGauge,

    // Health
    pub health_status: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_processed = IntCounterVec::new(
            Opts::new("tracking_events_processed_total", "Tracking events processed"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_processed.clone()))?;

        let events_failed = IntCounterVec::new(
            Opts::new("tracking_events_failed_total", "Tracking events that failed processing"),
            &["event_type", "reason"],
        )?;
        registry.register(Box::new(events_failed.clone()))?;

        let processing_duration = HistogramVec::new(
            HistogramOpts::new(
                "tracking_event_processing_duration_seconds",
                "Tracking event processing duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["event_type"],
        )?;
        registry.register(Box::new(processing_duration.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Attempts beyond the first, per operation"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_outcomes = IntCounterVec::new(
            Opts::new("retry_outcomes_total", "Final outcome of retried operations"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(retry_outcomes.clone()))?;

        let dlq_messages_total =
            IntCounter::new("dlq_messages_total", "Messages written to the dead letter queue")?;
        registry.register(Box::new(dlq_messages_total.clone()))?;

        let dlq_messages_by_event_type = IntCounterVec::new(
            Opts::new("dlq_messages_by_event_type", "DLQ messages by event type"),
            &["event_type"],
        )?;
        registry.register(Box::new(dlq_messages_by_event_type.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Notification circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let health_status = IntGauge::new(
            "service_health_status",
            "Aggregated service health (0=Unhealthy, 1=Degraded, 2=Healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        Ok(Self {
            registry,
            events_processed,
            events_failed,
            processing_duration,
            retry_attempts_total,
            retry_outcomes,
            dlq_messages_total,
            dlq_messages_by_event_type,
            circuit_breaker_state,
            health_status,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_event(&self, event_type: &str, duration_secs: f64) {
        self.events_processed.with_label_values(&[event_type]).inc();
        self.processing_duration
            .with_label_values(&[event_type])
            .observe(duration_secs);
    }

    pub fn record_event_failure(&self, event_type: &str, reason: &str) {
        self.events_failed.with_label_values(&[event_type, reason]).inc();
    }

    /// `attempts` includes the first try; only the extra ones are counted.
    pub fn record_retry(&self, operation: &str, attempts: u32, outcome: &str) {
        if attempts > 1 {
            self.retry_attempts_total
                .with_label_values(&[operation])
                .inc_by(u64::from(attempts - 1));
            self.retry_outcomes.with_label_values(&[operation, outcome]).inc();
        }
    }

    pub fn record_dlq_message(&self, event_type: &str) {
        self.dlq_messages_total.inc();
        self.dlq_messages_by_event_type.with_label_values(&[event_type]).inc();
    }
}
