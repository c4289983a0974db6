use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::TrackingError;

// ============================================================================
// Tracking Value Objects
// ============================================================================
//
// Statuses are persisted and exchanged using the Portuguese labels the
// upstream order and payment services already speak. English snake-case
// aliases are accepted on input; output always uses the canonical label.
//
// ============================================================================

pub type OrderId = i64;

/// Kitchen-side progression of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderStatus {
    Received,
    InPreparation,
    Ready,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Received,
        OrderStatus::InPreparation,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ];

    /// Statuses the kitchen is actively working on.
    pub const KITCHEN_QUEUE: [OrderStatus; 2] = [OrderStatus::InPreparation, OrderStatus::Ready];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "Recebido",
            OrderStatus::InPreparation => "Em preparação",
            OrderStatus::Ready => "Pronto",
            OrderStatus::Completed => "Finalizado",
        }
    }

    /// Legal successors of this status. `Completed` has none.
    pub const fn next_states(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Received => &[OrderStatus::InPreparation],
            OrderStatus::InPreparation => &[OrderStatus::Ready],
            OrderStatus::Ready => &[OrderStatus::Completed],
            OrderStatus::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, candidate: OrderStatus) -> bool {
        self.next_states().contains(&candidate)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recebido" | "received" => Ok(OrderStatus::Received),
            "em preparação" | "in_preparation" => Ok(OrderStatus::InPreparation),
            "pronto" | "ready" => Ok(OrderStatus::Ready),
            "finalizado" | "completed" => Ok(OrderStatus::Completed),
            _ => Err(TrackingError::InvalidOrderStatus(s.to_string())),
        }
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Payment axis of an order. Has no transition graph of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pendente",
            PaymentStatus::Paid => "pago",
            PaymentStatus::Failed => "falhou",
        }
    }

    /// Only a confirmed payment may move the order itself forward.
    pub fn triggers_order_update(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pendente" | "pending" => Ok(PaymentStatus::Pending),
            "pago" | "paid" => Ok(PaymentStatus::Paid),
            "falhou" | "failed" => Ok(PaymentStatus::Failed),
            _ => Err(TrackingError::InvalidPaymentStatus(s.to_string())),
        }
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Product classification supplied by the order service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCategory {
    Lanche,
    Acompanhamento,
    Bebida,
    Sobremesa,
    Unknown,
}

impl ItemCategory {
    /// Case-insensitive match on the upstream label; anything unrecognized,
    /// missing or empty is `Unknown`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::to_uppercase).as_deref() {
            Some("LANCHE") => ItemCategory::Lanche,
            Some("ACOMPANHAMENTO") => ItemCategory::Acompanhamento,
            Some("BEBIDA") => ItemCategory::Bebida,
            Some("SOBREMESA") => ItemCategory::Sobremesa,
            _ => ItemCategory::Unknown,
        }
    }
}

// ============================================================================
// Line Item
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LineItemFields")]
pub struct LineItem {
    product_id: i64,
    quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

impl LineItem {
    pub fn new(
        product_id: i64,
        quantity: i64,
        category: Option<String>,
    ) -> Result<Self, TrackingError> {
        if product_id <= 0 {
            return Err(TrackingError::InvalidProductId(product_id));
        }

        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(TrackingError::InvalidQuantity(quantity))?;

        let category = category.filter(|c| !c.trim().is_empty());

        Ok(Self {
            product_id,
            quantity,
            category,
        })
    }

    pub fn product_id(&self) -> i64 {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn item_category(&self) -> ItemCategory {
        ItemCategory::from_label(self.category())
    }
}

#[derive(Deserialize)]
struct LineItemFields {
    product_id: i64,
    quantity: i64,
    #[serde(default)]
    category: Option<String>,
}

impl TryFrom<LineItemFields> for LineItem {
    type Error = TrackingError;

    fn try_from(fields: LineItemFields) -> Result<Self, Self::Error> {
        LineItem::new(fields.product_id, fields.quantity, fields.category)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
