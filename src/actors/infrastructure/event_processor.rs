use actix::prelude::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::dlq::AddToDlq;
use super::health_monitor::{HealthMonitorActor, UpdateHealth};
use crate::actors::core::HealthStatus;
use crate::domain::tracking::{OrderId, ReconciliationService, TrackingError, TrackingEvent};
use crate::messaging::{EventSource, ReceivedMessage};
use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, IsTransient, RetryConfig, RetryResult};

// ============================================================================
// Event Processor Actor - Consumes one topic into the tracking service
// ============================================================================
//
// Flow per message:
//   1. Parse the envelope into a TrackingEvent
//   2. Apply it through the ReconciliationService, retrying transient failures
//   3. Dead-letter what cannot be applied, then ack
//
// A message is acked only once it is applied, rejected or stored in the
// DLQ. If the DLQ write fails too, the worker stops without acking so the
// message is redelivered from the last committed offset.
//
// ============================================================================

const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Final outcome for one consumed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    /// Refused by the domain (illegal transition, empty order, ...)
    Rejected,
    DeadLettered,
    /// Neither applied nor stored in the DLQ. Must not be acked.
    Unhandled,
}

#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("Payment for order {0} arrived before the order was tracked")]
    AwaitingOrder(OrderId),
}

impl DispatchError {
    fn kind(&self) -> &'static str {
        match self {
            DispatchError::Tracking(e) => e.kind(),
            DispatchError::AwaitingOrder(_) => "AwaitingOrder",
        }
    }
}

impl IsTransient for DispatchError {
    fn is_transient(&self) -> bool {
        match self {
            DispatchError::Tracking(e) => e.is_transient(),
            // The order event may still be in flight on the other topic
            DispatchError::AwaitingOrder(_) => true,
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct EventDispatcher {
    service: Arc<ReconciliationService>,
    metrics: Arc<Metrics>,
    dlq: Option<Recipient<AddToDlq>>,
    retry_config: RetryConfig,
}

impl EventDispatcher {
    pub fn new(
        service: Arc<ReconciliationService>,
        metrics: Arc<Metrics>,
        dlq: Option<Recipient<AddToDlq>>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            service,
            metrics,
            dlq,
            retry_config,
        }
    }

    pub async fn process(&self, message: &ReceivedMessage) -> Disposition {
        let event = match TrackingEvent::from_json(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                let event_type = match &e {
                    TrackingError::UnknownEventType(t) => t.clone(),
                    _ => "unknown".to_string(),
                };

                tracing::warn!(
                    topic = %message.topic,
                    offset = message.offset,
                    event_type = %event_type,
                    error = %e,
                    "Unprocessable message"
                );
                self.metrics.record_event_failure(&event_type, e.kind());
                return self.dead_letter(message, &event_type, e.to_string(), 1).await;
            }
        };

        let event_type = event.event_type();
        let started = Instant::now();

        let service = self.service.as_ref();
        let event_ref = &event;
        let result = retry_on_transient(self.retry_config.clone(), move |_attempt| async move {
            match service.apply(event_ref).await? {
                Some(record) => Ok(record),
                None => Err(DispatchError::AwaitingOrder(event_ref.order_id())),
            }
        })
        .await;

        match result {
            RetryResult::Success { value, attempts } => {
                self.metrics
                    .record_event(event_type, started.elapsed().as_secs_f64());
                self.metrics.record_retry("apply_event", attempts, "success");

                tracing::debug!(
                    order_id = value.order_id,
                    event_type,
                    status = %value.status,
                    version = value.version,
                    "Event applied"
                );
                Disposition::Applied
            }
            RetryResult::Permanent { error, .. } => {
                tracing::warn!(
                    order_id = event.order_id(),
                    event_type,
                    error = %error,
                    "Event rejected"
                );
                self.metrics.record_event_failure(event_type, error.kind());
                Disposition::Rejected
            }
            RetryResult::Exhausted { error, attempts } => {
                self.metrics.record_retry("apply_event", attempts, "exhausted");
                self.metrics.record_event_failure(event_type, error.kind());
                self.dead_letter(message, event_type, error.to_string(), attempts)
                    .await
            }
        }
    }

    async fn dead_letter(
        &self,
        message: &ReceivedMessage,
        event_type: &str,
        error_message: String,
        failure_count: u32,
    ) -> Disposition {
        match self.store_in_dlq(message, event_type, error_message, failure_count).await {
            Ok(()) => {
                self.metrics.record_dlq_message(event_type);
                Disposition::DeadLettered
            }
            Err(e) => {
                tracing::error!(
                    topic = %message.topic,
                    offset = message.offset,
                    event_type,
                    error = %e,
                    payload = %message.payload_lossy(),
                    "Failed to store message in DLQ"
                );
                Disposition::Unhandled
            }
        }
    }

    async fn store_in_dlq(
        &self,
        message: &ReceivedMessage,
        event_type: &str,
        error_message: String,
        failure_count: u32,
    ) -> Result<(), String> {
        let dlq = self
            .dlq
            .as_ref()
            .ok_or_else(|| "no dead letter queue configured".to_string())?;

        let entry = AddToDlq {
            id: Uuid::now_v7(),
            source: message.topic.clone(),
            event_type: event_type.to_string(),
            payload: message.payload_lossy(),
            error_message,
            failure_count: i32::try_from(failure_count).unwrap_or(i32::MAX),
            first_failed_at: Utc::now(),
        };

        dlq.send(entry)
            .await
            .map_err(|e| format!("DLQ actor unreachable: {e}"))?
    }
}

// ============================================================================
// Consumer Loop
// ============================================================================

/// Drain `source` until it closes or a message can be neither applied nor
/// dead-lettered. Returns the number of messages acked.
pub async fn consume(
    source: Arc<dyn EventSource>,
    dispatcher: Arc<EventDispatcher>,
    health_monitor: Option<Addr<HealthMonitorActor>>,
) -> u64 {
    let component = format!("consumer:{}", source.name());
    let report = |status: HealthStatus| {
        if let Some(monitor) = &health_monitor {
            monitor.do_send(UpdateHealth {
                component: component.clone(),
                status,
                details: None,
            });
        }
    };

    report(HealthStatus::Healthy);
    let mut healthy = true;
    let mut handled = 0u64;

    loop {
        let message = match source.receive().await {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::info!(source = source.name(), handled, "Event source closed");
                return handled;
            }
            Err(e) => {
                tracing::error!(source = source.name(), error = %e, "Failed to receive message");
                if healthy {
                    report(HealthStatus::Degraded(e.to_string()));
                    healthy = false;
                }
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                continue;
            }
        };

        if !healthy {
            report(HealthStatus::Healthy);
            healthy = true;
        }

        if dispatcher.process(&message).await == Disposition::Unhandled {
            // Committing anything past this offset would skip it for good
            tracing::error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                handled,
                "💥 Message could not be applied or dead-lettered, stopping consumer"
            );
            report(HealthStatus::Unhealthy(format!(
                "offset {} on {} left unhandled",
                message.offset, message.topic
            )));
            return handled;
        }
        handled += 1;

        if let Err(e) = source.ack(&message).await {
            tracing::error!(
                topic = %message.topic,
                offset = message.offset,
                error = %e,
                "Failed to ack message"
            );
        }
    }
}

// ============================================================================
// Actor
// ============================================================================

pub struct EventProcessor {
    source: Arc<dyn EventSource>,
    dispatcher: Arc<EventDispatcher>,
    health_monitor: Option<Addr<HealthMonitorActor>>,
}

impl EventProcessor {
    pub fn new(
        source: Arc<dyn EventSource>,
        dispatcher: Arc<EventDispatcher>,
        health_monitor: Option<Addr<HealthMonitorActor>>,
    ) -> Self {
        Self {
            source,
            dispatcher,
            health_monitor,
        }
    }
}

impl Actor for EventProcessor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(source = self.source.name(), "🚀 EventProcessor started");

        let worker = consume(
            self.source.clone(),
            self.dispatcher.clone(),
            self.health_monitor.clone(),
        );

        ctx.spawn(worker.into_actor(self).map(|_, _act, ctx| ctx.stop()));
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(source = self.source.name(), "EventProcessor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tracking::{NoopNotifier, OrderStatus, OrderTrackingRecord, PaymentStatus};
    use crate::messaging::InMemoryEventSource;
    use crate::store::{InMemoryTrackingStore, StoreError, TrackingStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingDlq {
        entries: Arc<Mutex<Vec<AddToDlq>>>,
    }

    impl Actor for CapturingDlq {
        type Context = Context<Self>;
    }

    impl Handler<AddToDlq> for CapturingDlq {
        type Result = Result<(), String>;

        fn handle(&mut self, msg: AddToDlq, _ctx: &mut Self::Context) -> Self::Result {
            self.entries.lock().unwrap().push(msg);
            Ok(())
        }
    }

    /// DLQ whose database is as unavailable as the record store.
    struct RefusingDlq;

    impl Actor for RefusingDlq {
        type Context = Context<Self>;
    }

    impl Handler<AddToDlq> for RefusingDlq {
        type Result = Result<(), String>;

        fn handle(&mut self, _msg: AddToDlq, _ctx: &mut Self::Context) -> Self::Result {
            Err("Failed to insert into DLQ: pool timed out".to_string())
        }
    }

    fn pool_timed_out() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }

    /// Every call fails the way Postgres does when the pool is exhausted.
    struct DownStore;

    #[async_trait]
    impl TrackingStore for DownStore {
        async fn create(&self, _record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError> {
            Err(pool_timed_out())
        }

        async fn find_by_order_id(&self, _order_id: OrderId) -> Result<Option<OrderTrackingRecord>, StoreError> {
            Err(pool_timed_out())
        }

        async fn find_by_customer(&self, _customer_id: &str) -> Result<Vec<OrderTrackingRecord>, StoreError> {
            Err(pool_timed_out())
        }

        async fn find_by_status(&self, _statuses: &[OrderStatus]) -> Result<Vec<OrderTrackingRecord>, StoreError> {
            Err(pool_timed_out())
        }

        async fn update(&self, _record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError> {
            Err(pool_timed_out())
        }

        async fn list(&self, _offset: i64, _limit: i64) -> Result<Vec<OrderTrackingRecord>, StoreError> {
            Err(pool_timed_out())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(pool_timed_out())
        }
    }

    /// Loses the first update to a concurrent writer, then behaves.
    #[derive(Default)]
    struct ConflictOnceStore {
        inner: InMemoryTrackingStore,
        conflicted: AtomicBool,
    }

    #[async_trait]
    impl TrackingStore for ConflictOnceStore {
        async fn create(&self, record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError> {
            self.inner.create(record).await
        }

        async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<OrderTrackingRecord>, StoreError> {
            self.inner.find_by_order_id(order_id).await
        }

        async fn find_by_customer(&self, customer_id: &str) -> Result<Vec<OrderTrackingRecord>, StoreError> {
            self.inner.find_by_customer(customer_id).await
        }

        async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderTrackingRecord>, StoreError> {
            self.inner.find_by_status(statuses).await
        }

        async fn update(&self, record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError> {
            if !self.conflicted.swap(true, Ordering::SeqCst) {
                return Err(StoreError::VersionConflict {
                    order_id: record.order_id,
                    expected: record.version,
                });
            }
            self.inner.update(record).await
        }

        async fn list(&self, offset: i64, limit: i64) -> Result<Vec<OrderTrackingRecord>, StoreError> {
            self.inner.list(offset, limit).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct Harness {
        dispatcher: Arc<EventDispatcher>,
        service: Arc<ReconciliationService>,
        metrics: Arc<Metrics>,
        dlq_entries: Arc<Mutex<Vec<AddToDlq>>>,
    }

    fn harness() -> Harness {
        let dlq = CapturingDlq::default();
        let dlq_entries = dlq.entries.clone();
        let mut h = harness_with(Arc::new(InMemoryTrackingStore::new()), dlq.start().recipient());
        h.dlq_entries = dlq_entries;
        h
    }

    fn harness_with(store: Arc<dyn TrackingStore>, dlq: Recipient<AddToDlq>) -> Harness {
        let service = Arc::new(ReconciliationService::new(store, Arc::new(NoopNotifier)));
        let metrics = Arc::new(Metrics::new().unwrap());
        let retry_config = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        };

        let dispatcher = Arc::new(EventDispatcher::new(
            service.clone(),
            metrics.clone(),
            Some(dlq),
            retry_config,
        ));

        Harness {
            dispatcher,
            service,
            metrics,
            dlq_entries: Arc::default(),
        }
    }

    fn counter(metrics: &Metrics, name: &str) -> f64 {
        metrics
            .registry()
            .gather()
            .iter()
            .filter(|family| family.name() == name)
            .flat_map(|family| family.metric.iter())
            .map(|m| m.counter.value.unwrap_or_default())
            .sum()
    }

    fn message(offset: i64, payload: &str) -> ReceivedMessage {
        ReceivedMessage {
            topic: "order-events".to_string(),
            partition: 0,
            offset,
            key: None,
            payload: payload.as_bytes().to_vec(),
        }
    }

    fn order_created(order_id: i64) -> String {
        serde_json::json!({
            "event_type": "order_created",
            "data": {
                "id_order": order_id,
                "customer_id": "12345678901",
                "items": [{"id": 1, "quantity": 1, "price": 25.0, "category": "LANCHE"}],
                "total_amount": 25.0,
                "status": "RECEBIDO",
                "created_at": "2024-05-01T12:00:00Z"
            }
        })
        .to_string()
    }

    fn payment(order_id: i64, status: &str) -> String {
        serde_json::json!({
            "event_type": "payment_confirmed",
            "data": {
                "id_payment": "pay-1",
                "id_order": order_id,
                "status": status,
                "amount": 25.0,
                "created_at": "2024-05-01T12:01:00Z"
            }
        })
        .to_string()
    }

    fn status_update(order_id: i64, status: &str) -> String {
        serde_json::json!({
            "event_type": "order_status_updated",
            "data": {"id_order": order_id, "status": status}
        })
        .to_string()
    }

    #[actix::test]
    async fn test_malformed_message_is_dead_lettered() {
        let h = harness();

        let outcome = h.dispatcher.process(&message(7, "{not json")).await;

        assert_eq!(outcome, Disposition::DeadLettered);
        let entries = h.dlq_entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, "order-events");
        assert_eq!(entries[0].payload, "{not json");
    }

    #[actix::test]
    async fn test_unknown_event_type_is_dead_lettered_under_its_name() {
        let h = harness();
        let payload = r#"{"event_type": "order_refunded", "data": {}}"#;

        let outcome = h.dispatcher.process(&message(0, payload)).await;

        assert_eq!(outcome, Disposition::DeadLettered);
        assert_eq!(h.dlq_entries.lock().unwrap()[0].event_type, "order_refunded");
    }

    #[actix::test]
    async fn test_illegal_transition_is_rejected_without_dlq() {
        let h = harness();
        h.dispatcher.process(&message(0, &order_created(10))).await;

        let outcome = h
            .dispatcher
            .process(&message(1, &status_update(10, "FINALIZADO")))
            .await;

        assert_eq!(outcome, Disposition::Rejected);
        assert!(h.dlq_entries.lock().unwrap().is_empty());
        let record = h.service.find(10).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Received);
    }

    #[actix::test]
    async fn test_payment_for_untracked_order_is_dead_lettered_after_retries() {
        let h = harness();

        let outcome = h.dispatcher.process(&message(0, &payment(99, "PAGO"))).await;

        assert_eq!(outcome, Disposition::DeadLettered);
        let entries = h.dlq_entries.lock().unwrap();
        assert_eq!(entries[0].failure_count, 2);
        assert!(entries[0].error_message.contains("99"));
    }

    #[actix::test]
    async fn test_consume_applies_and_acks_every_message() {
        let h = harness();
        let source = Arc::new(InMemoryEventSource::new(
            "order-events",
            vec![
                order_created(500),
                payment(500, "PAGO"),
                "garbage".to_string(),
                status_update(500, "PRONTO"),
            ],
        ));

        let handled = consume(source.clone(), h.dispatcher.clone(), None).await;

        assert_eq!(handled, 4);
        assert_eq!(source.acked_offsets(), vec![0, 1, 2, 3]);

        let record = h.service.find(500).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::Ready);
        assert_eq!(record.payment_status, PaymentStatus::Paid);
        assert_eq!(h.dlq_entries.lock().unwrap().len(), 1);
    }

    #[actix::test]
    async fn test_version_conflict_is_retried_and_applied() {
        let h = harness_with(
            Arc::new(ConflictOnceStore::default()),
            CapturingDlq::default().start().recipient(),
        );
        h.dispatcher.process(&message(0, &order_created(30))).await;

        let outcome = h.dispatcher.process(&message(1, &payment(30, "PAGO"))).await;

        assert_eq!(outcome, Disposition::Applied);
        // Two attempts: one retry beyond the first
        assert_eq!(counter(&h.metrics, "retry_attempts_total"), 1.0);
        let record = h.service.find(30).await.unwrap().unwrap();
        assert_eq!(record.status, OrderStatus::InPreparation);
        assert_eq!(record.version, 1);
    }

    #[actix::test]
    async fn test_failed_dead_letter_is_unhandled() {
        let h = harness_with(Arc::new(DownStore), RefusingDlq.start().recipient());

        let outcome = h.dispatcher.process(&message(0, &payment(40, "PAGO"))).await;

        assert_eq!(outcome, Disposition::Unhandled);
        assert_eq!(counter(&h.metrics, "dlq_messages_total"), 0.0);
    }

    #[actix::test]
    async fn test_consume_stops_without_acking_when_dlq_write_fails() {
        let h = harness_with(Arc::new(DownStore), RefusingDlq.start().recipient());
        let source = Arc::new(InMemoryEventSource::new(
            "payment-events",
            vec![payment(40, "PAGO"), "garbage".to_string()],
        ));

        let handled = consume(source.clone(), h.dispatcher.clone(), None).await;

        assert_eq!(handled, 0);
        assert!(source.acked_offsets().is_empty());
    }
}
