use actix::prelude::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{ComponentHealth, HealthStatus};
use crate::domain::tracking::ReconciliationService;
use crate::messaging::RedpandaClient;
use crate::metrics::Metrics;
use crate::utils::CircuitState;

// ============================================================================
// Health Monitor Actor - Monitors system health
// ============================================================================
//
// Responsibilities:
// - Probe the record store and the notification publisher on an interval
// - Collect health pushed by consumer workers
// - Aggregate everything into one system status for /tracking/health
//
// ============================================================================

const PROBE_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

#[derive(Message)]
#[rtype(result = "SystemHealth")]
pub struct GetSystemHealth;

#[derive(MessageResponse, Debug, Clone)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
    service: Arc<ReconciliationService>,
    redpanda: Option<Arc<RedpandaClient>>,
    metrics: Option<Arc<Metrics>>,
}

impl HealthMonitorActor {
    pub fn new(
        service: Arc<ReconciliationService>,
        redpanda: Option<Arc<RedpandaClient>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            components: HashMap::new(),
            service,
            redpanda,
            metrics,
        }
    }

    /// Worst component wins. Unhealthy reasons are listed by component.
    fn compute_overall_status(components: &HashMap<String, ComponentHealth>) -> HealthStatus {
        let mut unhealthy: Vec<String> = components
            .values()
            .filter_map(|health| match &health.status {
                HealthStatus::Unhealthy(msg) => Some(format!("{}: {}", health.name, msg)),
                _ => None,
            })
            .collect();

        if !unhealthy.is_empty() {
            unhealthy.sort();
            return HealthStatus::Unhealthy(unhealthy.join(", "));
        }

        if components.values().any(|h| matches!(h.status, HealthStatus::Degraded(_))) {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }

    fn probe(&self, ctx: &mut Context<Self>) {
        let addr = ctx.address();
        let service = self.service.clone();
        let redpanda = self.redpanda.clone();
        let metrics = self.metrics.clone();

        actix::spawn(async move {
            let database = match service.ping_store().await {
                Ok(()) => HealthStatus::Healthy,
                Err(e) => HealthStatus::Unhealthy(e.to_string()),
            };
            addr.do_send(UpdateHealth {
                component: "database".to_string(),
                status: database,
                details: None,
            });

            if let Some(redpanda) = redpanda {
                let state = redpanda.circuit_state().await;
                if let Some(metrics) = &metrics {
                    metrics.circuit_breaker_state.set(state.as_gauge());
                }

                let status = match state {
                    CircuitState::Closed => HealthStatus::Healthy,
                    CircuitState::HalfOpen => {
                        HealthStatus::Degraded("Circuit breaker half-open".to_string())
                    }
                    CircuitState::Open => {
                        HealthStatus::Degraded("Circuit breaker open, notifications paused".to_string())
                    }
                };

                addr.do_send(UpdateHealth {
                    component: "notification_publisher".to_string(),
                    status,
                    details: None,
                });
            }
        });
    }
}

impl Actor for HealthMonitorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("HealthMonitorActor started");

        self.probe(ctx);
        ctx.run_interval(PROBE_INTERVAL, |act, ctx| act.probe(ctx));
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<UpdateHealth> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateHealth, _ctx: &mut Self::Context) -> Self::Result {
        let previous = self.components.get(&msg.component).map(|h| h.status.clone());

        if previous.as_ref() != Some(&msg.status) {
            match &msg.status {
                HealthStatus::Healthy => {
                    tracing::info!(component = %msg.component, "Component healthy")
                }
                HealthStatus::Degraded(reason) => {
                    tracing::warn!(component = %msg.component, reason = %reason, "Component degraded")
                }
                HealthStatus::Unhealthy(reason) => {
                    tracing::error!(component = %msg.component, reason = %reason, "Component unhealthy")
                }
            }
        }

        let health = ComponentHealth::new(msg.component.clone(), msg.status).with_details(msg.details);
        self.components.insert(msg.component, health);

        if let Some(metrics) = &self.metrics {
            metrics
                .health_status
                .set(Self::compute_overall_status(&self.components).as_gauge());
        }
    }
}

impl Handler<GetSystemHealth> for HealthMonitorActor {
    type Result = SystemHealth;

    fn handle(&mut self, _msg: GetSystemHealth, _ctx: &mut Self::Context) -> Self::Result {
        SystemHealth {
            overall_status: Self::compute_overall_status(&self.components),
            components: self.components.clone(),
            check_time: Utc::now(),
        }
    }
}
