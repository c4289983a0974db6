use actix::prelude::*;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use super::{DlqActor, EventDispatcher, EventProcessor, HealthMonitorActor, UpdateHealth};
use crate::actors::core::HealthStatus;
use crate::domain::tracking::ReconciliationService;
use crate::messaging::{EventSource, RedpandaClient};
use crate::metrics::Metrics;
use crate::utils::RetryConfig;

// ============================================================================
// Coordinator Actor - Orchestrates all system actors
// ============================================================================
//
// Responsibilities:
// - Manages lifecycle of child actors
// - Wires every consumer worker to the shared DLQ and health monitor
// - Coordinates graceful shutdown
//
// Actor Hierarchy:
//   CoordinatorActor (Supervisor)
//   ├── HealthMonitorActor
//   ├── DlqActor
//   └── EventProcessor (one per topic)
//
// ============================================================================

const WORKER_CHECK_INTERVAL: Duration = Duration::from_secs(15);

pub struct CoordinatorActor {
    pool: PgPool,
    service: Arc<ReconciliationService>,
    metrics: Arc<Metrics>,
    redpanda: Option<Arc<RedpandaClient>>,
    sources: Vec<Arc<dyn EventSource>>,
    retry_config: RetryConfig,
    /// Running workers with the source each one drains
    processors: Vec<(Addr<EventProcessor>, String)>,
    health_monitor: Option<Addr<HealthMonitorActor>>,
    dlq_actor: Option<Addr<DlqActor>>,
}

impl CoordinatorActor {
    pub fn new(
        pool: PgPool,
        service: Arc<ReconciliationService>,
        metrics: Arc<Metrics>,
        redpanda: Option<Arc<RedpandaClient>>,
        sources: Vec<Arc<dyn EventSource>>,
    ) -> Self {
        Self {
            pool,
            service,
            metrics,
            redpanda,
            sources,
            retry_config: RetryConfig::default(),
            processors: Vec::new(),
            health_monitor: None,
            dlq_actor: None,
        }
    }

    fn start_child_actors(&mut self, _ctx: &mut Context<Self>) {
        tracing::info!("Starting supervised child actors");

        let health_monitor = HealthMonitorActor::new(
            self.service.clone(),
            self.redpanda.clone(),
            Some(self.metrics.clone()),
        )
        .start();
        self.health_monitor = Some(health_monitor.clone());

        let dlq_actor = DlqActor::new(self.pool.clone()).start();
        self.dlq_actor = Some(dlq_actor.clone());

        health_monitor.do_send(UpdateHealth {
            component: "dlq_actor".to_string(),
            status: HealthStatus::Healthy,
            details: Some("DLQ actor started".to_string()),
        });

        let dispatcher = Arc::new(EventDispatcher::new(
            self.service.clone(),
            self.metrics.clone(),
            Some(dlq_actor.recipient()),
            self.retry_config.clone(),
        ));

        for source in &self.sources {
            let processor = EventProcessor::new(
                source.clone(),
                dispatcher.clone(),
                Some(health_monitor.clone()),
            )
            .start();
            self.processors.push((processor, source.name().to_string()));
        }

        tracing::info!(
            consumers = self.processors.len(),
            "✅ All supervised actors started successfully"
        );
    }

    /// A worker whose source closed or failed has stopped for good; surface
    /// it once so /tracking/health turns unhealthy.
    fn check_workers(&mut self) {
        let Some(health_monitor) = &self.health_monitor else {
            return;
        };

        let mut running = Vec::with_capacity(self.processors.len());
        for (processor, source) in self.processors.drain(..) {
            if processor.connected() {
                running.push((processor, source));
                continue;
            }

            tracing::error!(source = %source, "💥 Consumer worker stopped");
            health_monitor.do_send(UpdateHealth {
                component: format!("consumer:{source}"),
                status: HealthStatus::Unhealthy("worker stopped".to_string()),
                details: None,
            });
        }
        self.processors = running;
    }
}

impl Actor for CoordinatorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("🎯 CoordinatorActor started - order tracking consumers");
        self.start_child_actors(ctx);
        ctx.run_interval(WORKER_CHECK_INTERVAL, |act, _ctx| act.check_workers());
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        tracing::info!("🛑 CoordinatorActor stopping - initiating graceful shutdown");
        Running::Stop
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("🛑 CoordinatorActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Option<Addr<HealthMonitorActor>>")]
pub struct GetHealthMonitor;

impl Handler<GetHealthMonitor> for CoordinatorActor {
    type Result = Option<Addr<HealthMonitorActor>>;

    fn handle(&mut self, _msg: GetHealthMonitor, _ctx: &mut Self::Context) -> Self::Result {
        self.health_monitor.clone()
    }
}

#[derive(Message)]
#[rtype(result = "Result<(), String>")]
pub struct Shutdown;

impl Handler<Shutdown> for CoordinatorActor {
    type Result = Result<(), String>;

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Received shutdown signal");

        // Consumers first, so nothing new heads for the DLQ
        for (processor, _) in self.processors.drain(..) {
            processor.do_send(StopActor);
        }

        if let Some(ref dlq_actor) = self.dlq_actor {
            dlq_actor.do_send(StopActor);
        }

        if let Some(ref health_monitor) = self.health_monitor {
            health_monitor.do_send(StopActor);
        }

        ctx.stop();

        Ok(())
    }
}

/// Stops a child actor. Sent only by the coordinator.
#[derive(Message)]
#[rtype(result = "()")]
struct StopActor;

impl Handler<StopActor> for EventProcessor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::debug!("Stopping consumer worker");
        ctx.stop();
    }
}

impl Handler<StopActor> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::debug!("Stopping health monitor");
        ctx.stop();
    }
}

impl Handler<StopActor> for DlqActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::debug!("Stopping DLQ actor");
        ctx.stop();
    }
}
