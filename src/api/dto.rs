use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::actors::SystemHealth;
use crate::domain::tracking::{
    EstimatedTime, LineItem, OrderId, OrderStatus, OrderTrackingRecord, PaymentStatus,
};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    pub const DEFAULT_LIMIT: i64 = 100;

    /// (offset, limit) with offset >= 0 and limit in 1..=100.
    pub fn window(&self) -> (i64, i64) {
        let offset = self.offset.unwrap_or(0).max(0);
        let limit = self
            .limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::DEFAULT_LIMIT);
        (offset, limit)
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub id_order: OrderId,
    pub customer_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub items: Vec<LineItem>,
    pub amount_paid: Option<Decimal>,
    pub estimated_time: Option<EstimatedTime>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl From<&OrderTrackingRecord> for TrackingResponse {
    fn from(record: &OrderTrackingRecord) -> Self {
        Self {
            id_order: record.order_id,
            customer_id: record.customer_id.clone(),
            status: record.status,
            payment_status: record.payment_status,
            items: record.items().to_vec(),
            amount_paid: record.amount_paid,
            estimated_time: record.estimated_time,
            updated_at: record.updated_at,
            version: record.version,
        }
    }
}

/// Kitchen monitor row.
#[derive(Debug, Serialize)]
pub struct TrackingSummary {
    pub id_order: OrderId,
    pub customer_id: String,
    pub status: OrderStatus,
    pub estimated_time: Option<EstimatedTime>,
    pub updated_at: DateTime<Utc>,
}

impl From<&OrderTrackingRecord> for TrackingSummary {
    fn from(record: &OrderTrackingRecord) -> Self {
        Self {
            id_order: record.order_id,
            customer_id: record.customer_id.clone(),
            status: record.status,
            estimated_time: record.estimated_time,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub orders: Vec<TrackingSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ComponentView {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub components: BTreeMap<String, ComponentView>,
}

impl HealthResponse {
    pub fn from_system(health: &SystemHealth, service: &str, version: &str) -> Self {
        let components = health
            .components
            .iter()
            .map(|(name, component)| {
                (
                    name.clone(),
                    ComponentView {
                        status: component.status.label(),
                        reason: component.status.reason().map(str::to_string),
                        details: component.details.clone(),
                        last_check: component.last_check,
                    },
                )
            })
            .collect();

        Self {
            status: health.overall_status.label(),
            service: service.to_string(),
            version: version.to_string(),
            timestamp: health.check_time,
            components,
        }
    }
}

/// Digits only, exactly eleven of them.
pub fn normalize_cpf(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (digits.len() == 11).then_some(digits)
}
