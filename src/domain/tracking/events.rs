use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::aggregate::OrderTrackingRecord;
use super::errors::TrackingError;
use super::estimated_time::EstimatedTime;
use super::value_objects::{LineItem, OrderId, OrderStatus, PaymentStatus};

// ============================================================================
// Tracking Events - Inbound
// ============================================================================
//
// Upstream services publish `{"event_type": ..., "data": {...}}` envelopes.
// Field names come in two dialects (English and the legacy Portuguese one);
// both are accepted here so the rest of the crate only ever sees typed
// events. Shape sniffing (quantity as string, naive timestamps, numeric
// ids) stops at this module.
//
// ============================================================================

pub const ORDER_CREATED: &str = "order_created";
pub const PAYMENT_CONFIRMED: &str = "payment_confirmed";
pub const PAYMENT_UPDATED: &str = "payment_updated";
pub const ORDER_STATUS_UPDATED: &str = "order_status_updated";

#[derive(Debug, Clone, PartialEq)]
pub struct OrderCreatedEvent {
    pub order_id: OrderId,
    pub customer_id: String,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub estimated_time: Option<EstimatedTime>,
    /// Status as reported by the order service. Informational only.
    pub upstream_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEvent {
    pub payment_id: String,
    pub order_id: OrderId,
    pub status: PaymentStatus,
    pub amount: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusUpdatedEvent {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

/// Every event the tracking service reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    OrderCreated(OrderCreatedEvent),
    Payment(PaymentEvent),
    StatusUpdated(OrderStatusUpdatedEvent),
}

impl TrackingEvent {
    /// Parse a raw queue message.
    pub fn from_json(payload: &[u8]) -> Result<Self, TrackingError> {
        let envelope: Envelope = serde_json::from_slice(payload)
            .map_err(|e| TrackingError::MalformedEvent(format!("invalid envelope: {e}")))?;

        Self::from_parts(&envelope.event_type, envelope.data)
    }

    pub fn from_parts(event_type: &str, data: Value) -> Result<Self, TrackingError> {
        match event_type {
            ORDER_CREATED | "pedido_criado" => {
                OrderCreatedEvent::from_data(data).map(TrackingEvent::OrderCreated)
            }
            PAYMENT_CONFIRMED | PAYMENT_UPDATED | "pagamento_confirmado"
            | "pagamento_atualizado" => PaymentEvent::from_data(data).map(TrackingEvent::Payment),
            ORDER_STATUS_UPDATED | "pedido_status_atualizado" => {
                OrderStatusUpdatedEvent::from_data(data).map(TrackingEvent::StatusUpdated)
            }
            other => Err(TrackingError::UnknownEventType(other.to_string())),
        }
    }

    /// Canonical type name, used for logging and metric labels.
    pub fn event_type(&self) -> &'static str {
        match self {
            TrackingEvent::OrderCreated(_) => ORDER_CREATED,
            TrackingEvent::Payment(_) => PAYMENT_UPDATED,
            TrackingEvent::StatusUpdated(_) => ORDER_STATUS_UPDATED,
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            TrackingEvent::OrderCreated(e) => e.order_id,
            TrackingEvent::Payment(e) => e.order_id,
            TrackingEvent::StatusUpdated(e) => e.order_id,
        }
    }
}

impl OrderCreatedEvent {
    /// Build from the `data` object of an order envelope (or an HTTP body).
    pub fn from_data(data: Value) -> Result<Self, TrackingError> {
        let wire: OrderCreatedData = decode(ORDER_CREATED, data)?;

        let items = wire
            .items
            .into_iter()
            .map(|item| {
                LineItem::new(item.product_id, resolve_quantity(&item.quantity), item.category)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(ORDER_CREATED, e))?;

        let estimated_time = wire
            .estimated_time
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| raw.parse::<EstimatedTime>())
            .transpose()
            .map_err(|e| malformed(ORDER_CREATED, e))?;

        Ok(Self {
            order_id: wire.order_id,
            customer_id: wire.customer_id,
            items,
            total_amount: wire.total_amount,
            estimated_time,
            upstream_status: wire.status,
            created_at: resolve_timestamp(ORDER_CREATED, wire.created_at)?,
        })
    }
}

impl PaymentEvent {
    pub fn from_data(data: Value) -> Result<Self, TrackingError> {
        let wire: PaymentData = decode(PAYMENT_UPDATED, data)?;

        let status = wire
            .status
            .parse::<PaymentStatus>()
            .map_err(|e| malformed(PAYMENT_UPDATED, e))?;

        Ok(Self {
            payment_id: wire.payment_id,
            order_id: wire.order_id,
            status,
            amount: wire.amount,
            occurred_at: resolve_timestamp(PAYMENT_UPDATED, wire.created_at)?,
        })
    }
}

impl OrderStatusUpdatedEvent {
    pub fn from_data(data: Value) -> Result<Self, TrackingError> {
        let wire: StatusUpdatedData = decode(ORDER_STATUS_UPDATED, data)?;

        let status = wire
            .status
            .parse::<OrderStatus>()
            .map_err(|e| malformed(ORDER_STATUS_UPDATED, e))?;

        Ok(Self {
            order_id: wire.order_id,
            status,
            updated_at: resolve_timestamp(ORDER_STATUS_UPDATED, wire.updated_at)?,
        })
    }
}

// ============================================================================
// Tracking Events - Outbound
// ============================================================================

/// Published to the notification topic when a customer should hear about
/// their order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingUpdated {
    pub id_order: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub estimated_time: Option<EstimatedTime>,
    pub updated_at: DateTime<Utc>,
}

impl TrackingUpdated {
    pub const EVENT_TYPE: &'static str = "tracking_updated";

    pub fn from_record(record: &OrderTrackingRecord) -> Self {
        Self {
            id_order: record.order_id,
            status: record.status,
            payment_status: record.payment_status,
            estimated_time: record.estimated_time,
            updated_at: record.updated_at,
        }
    }

    pub fn to_envelope(&self) -> serde_json::Result<String> {
        serde_json::to_string(&serde_json::json!({
            "event_type": Self::EVENT_TYPE,
            "data": self,
        }))
    }
}

// ============================================================================
// Wire Formats
// ============================================================================

#[derive(Deserialize)]
struct Envelope {
    event_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct OrderCreatedData {
    #[serde(rename = "id_order", alias = "id_pedido")]
    order_id: OrderId,
    #[serde(alias = "cpf_cliente", deserialize_with = "string_or_number")]
    customer_id: String,
    #[serde(alias = "itens")]
    items: Vec<ItemData>,
    #[serde(alias = "total_pedido", default)]
    total_amount: Decimal,
    #[serde(alias = "tempo_estimado", default)]
    estimated_time: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(alias = "criado_em", default)]
    created_at: Option<String>,
}

#[derive(Deserialize)]
struct ItemData {
    #[serde(rename = "id", alias = "id_produto", alias = "product_id")]
    product_id: i64,
    #[serde(alias = "quantidade", default)]
    quantity: Value,
    #[serde(alias = "categoria", default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct PaymentData {
    #[serde(rename = "id_payment", alias = "id_pagamento", deserialize_with = "string_or_number")]
    payment_id: String,
    #[serde(rename = "id_order", alias = "id_pedido")]
    order_id: OrderId,
    status: String,
    #[serde(alias = "valor", default)]
    amount: Option<Decimal>,
    #[serde(alias = "criado_em", default)]
    created_at: Option<String>,
}

#[derive(Deserialize)]
struct StatusUpdatedData {
    #[serde(rename = "id_order", alias = "id_pedido")]
    order_id: OrderId,
    status: String,
    #[serde(alias = "atualizado_em", default)]
    updated_at: Option<String>,
}

fn decode<T: serde::de::DeserializeOwned>(event_type: &str, data: Value) -> Result<T, TrackingError> {
    serde_json::from_value(data).map_err(|e| malformed(event_type, e))
}

fn malformed(event_type: &str, error: impl std::fmt::Display) -> TrackingError {
    TrackingError::MalformedEvent(format!("{event_type}: {error}"))
}

/// Integer, numeric string, or anything else as 1.
fn resolve_quantity(raw: &Value) -> i64 {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .unwrap_or(1),
        Value::String(s) => s.trim().parse().unwrap_or(1),
        _ => 1,
    }
}

/// RFC 3339, or a naive ISO-8601 timestamp read as UTC. Missing means now.
fn resolve_timestamp(event_type: &str, raw: Option<String>) -> Result<DateTime<Utc>, TrackingError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(Utc::now());
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| malformed(event_type, format!("invalid timestamp '{raw}'")))
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
