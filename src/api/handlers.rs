use actix::Addr;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::dto::{
    normalize_cpf, ComponentView, HealthResponse, ListQuery, QueueResponse, SuccessResponse,
    TrackingResponse, TrackingSummary, UpdateStatusRequest,
};
use super::error::ApiError;
use crate::actors::{GetSystemHealth, HealthMonitorActor, HealthStatus};
use crate::config::AppInfo;
use crate::domain::tracking::{
    OrderCreatedEvent, OrderId, OrderStatus, PaymentEvent, ReconciliationService, TrackingError,
};

/// Shared by every handler.
pub struct ApiState {
    pub service: Arc<ReconciliationService>,
    pub app: AppInfo,
    pub health_monitor: Option<Addr<HealthMonitorActor>>,
}

type ApiResult = Result<HttpResponse, ApiError>;

// ============================================================================
// Health
// ============================================================================

pub async fn health(state: web::Data<ApiState>) -> HttpResponse {
    let response = match &state.health_monitor {
        Some(monitor) => match monitor.send(GetSystemHealth).await {
            Ok(system) => HealthResponse::from_system(&system, &state.app.name, &state.app.version),
            Err(e) => {
                tracing::error!(error = %e, "Health monitor unreachable");
                standalone_health(&state, HealthStatus::Unhealthy(e.to_string()))
            }
        },
        None => {
            let database = match state.service.ping_store().await {
                Ok(()) => HealthStatus::Healthy,
                Err(e) => HealthStatus::Unhealthy(e.to_string()),
            };
            standalone_health(&state, database)
        }
    };

    if response.status == "unhealthy" {
        HttpResponse::ServiceUnavailable().json(response)
    } else {
        HttpResponse::Ok().json(response)
    }
}

/// Health without a monitor: the store is the only component we can see.
fn standalone_health(state: &ApiState, database: HealthStatus) -> HealthResponse {
    let now = Utc::now();
    let mut components = BTreeMap::new();
    components.insert(
        "database".to_string(),
        ComponentView {
            status: database.label(),
            reason: database.reason().map(str::to_string),
            details: None,
            last_check: now,
        },
    );

    HealthResponse {
        status: database.label(),
        service: state.app.name.clone(),
        version: state.app.version.clone(),
        timestamp: now,
        components,
    }
}

// ============================================================================
// Queries
// ============================================================================

pub async fn get_tracking(state: web::Data<ApiState>, path: web::Path<OrderId>) -> ApiResult {
    let order_id = path.into_inner();
    let record = state
        .service
        .find(order_id)
        .await?
        .ok_or(TrackingError::NotFound(order_id))?;

    Ok(HttpResponse::Ok().json(TrackingResponse::from(&record)))
}

pub async fn kitchen_queue(state: web::Data<ApiState>) -> ApiResult {
    let records = state.service.kitchen_queue().await?;
    let orders: Vec<TrackingSummary> = records.iter().map(TrackingSummary::from).collect();

    Ok(HttpResponse::Ok().json(QueueResponse {
        total: orders.len(),
        orders,
    }))
}

pub async fn customer_orders(state: web::Data<ApiState>, path: web::Path<String>) -> ApiResult {
    let raw = path.into_inner();
    let cpf = normalize_cpf(&raw).ok_or(ApiError::InvalidCpf(raw))?;

    let records = state.service.customer_orders(&cpf).await?;
    let body: Vec<TrackingResponse> = records.iter().map(TrackingResponse::from).collect();

    Ok(HttpResponse::Ok().json(body))
}

pub async fn list_tracking(state: web::Data<ApiState>, query: web::Query<ListQuery>) -> ApiResult {
    let (offset, limit) = query.window();
    let records = state.service.list(offset, limit).await?;
    let body: Vec<TrackingResponse> = records.iter().map(TrackingResponse::from).collect();

    Ok(HttpResponse::Ok().json(body))
}

// ============================================================================
// Commands
// ============================================================================

pub async fn update_status(
    state: web::Data<ApiState>,
    path: web::Path<OrderId>,
    body: web::Json<UpdateStatusRequest>,
) -> ApiResult {
    let order_id = path.into_inner();
    let requested: OrderStatus = body.status.parse()?;

    let record = state.service.update_status(order_id, requested).await?;

    Ok(HttpResponse::Ok().json(TrackingResponse::from(&record)))
}

pub async fn ingest_order_event(state: web::Data<ApiState>, body: web::Json<Value>) -> ApiResult {
    let event = OrderCreatedEvent::from_data(body.into_inner())?;
    let record = state.service.handle_order_created(&event).await?;

    Ok(HttpResponse::Ok().json(SuccessResponse::new(
        format!("Order event {} processed", record.order_id),
        json!({
            "id_order": record.order_id,
            "status": record.status,
            "updated_at": record.updated_at,
        }),
    )))
}

pub async fn ingest_payment_event(state: web::Data<ApiState>, body: web::Json<Value>) -> ApiResult {
    let event = PaymentEvent::from_data(body.into_inner())?;
    let record = state
        .service
        .handle_payment(&event)
        .await?
        .ok_or(TrackingError::NotFound(event.order_id))?;

    Ok(HttpResponse::Ok().json(SuccessResponse::new(
        format!("Payment event for order {} processed", record.order_id),
        json!({
            "id_order": record.order_id,
            "payment_status": record.payment_status,
            "updated_at": record.updated_at,
        }),
    )))
}
