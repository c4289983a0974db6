use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{StoreError, TrackingStore};
use crate::domain::tracking::{
    EstimatedTime, LineItem, OrderId, OrderStatus, OrderTrackingRecord, PaymentStatus,
    RecordSnapshot,
};

// ============================================================================
// Postgres Tracking Store
// ============================================================================
//
// Statuses are stored as their canonical labels and items as a JSON array.
// A label or payload this build cannot read surfaces as `Corrupt` instead
// of being guessed at.
//
// ============================================================================

const SELECT_COLUMNS: &str = "order_id, customer_id, status, payment_status, items, \
                              amount_paid, estimated_time, updated_at, version";

pub struct PostgresTrackingStore {
    pool: PgPool,
}

impl PostgresTrackingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table and its indexes if they are missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS order_tracking (
                order_id        BIGINT PRIMARY KEY,
                customer_id     TEXT NOT NULL,
                status          TEXT NOT NULL,
                payment_status  TEXT NOT NULL,
                items           TEXT NOT NULL,
                amount_paid     NUMERIC(10, 2),
                estimated_time  TEXT,
                updated_at      TIMESTAMPTZ NOT NULL,
                version         BIGINT NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_order_tracking_customer \
             ON order_tracking (customer_id, updated_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_order_tracking_status \
             ON order_tracking (status, updated_at)",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("order_tracking schema ready");
        Ok(())
    }

    fn encode_items(record: &OrderTrackingRecord) -> Result<String, StoreError> {
        serde_json::to_string(record.items()).map_err(|e| StoreError::Corrupt {
            order_id: record.order_id,
            reason: format!("items not serializable: {e}"),
        })
    }

    fn decode_row(row: &PgRow) -> Result<OrderTrackingRecord, StoreError> {
        let order_id: OrderId = row.try_get("order_id")?;
        let corrupt = |reason: String| StoreError::Corrupt { order_id, reason };

        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;
        let items: String = row.try_get("items")?;
        let estimated_time: Option<String> = row.try_get("estimated_time")?;

        let items: Vec<LineItem> =
            serde_json::from_str(&items).map_err(|e| corrupt(format!("items: {e}")))?;

        let snapshot = RecordSnapshot {
            order_id,
            customer_id: row.try_get("customer_id")?,
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| corrupt(e.to_string()))?,
            payment_status: payment_status
                .parse::<PaymentStatus>()
                .map_err(|e| corrupt(e.to_string()))?,
            items,
            amount_paid: row.try_get::<Option<Decimal>, _>("amount_paid")?,
            estimated_time: estimated_time
                .map(|raw| raw.parse::<EstimatedTime>())
                .transpose()
                .map_err(|e| corrupt(e.to_string()))?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            version: row.try_get("version")?,
        };

        OrderTrackingRecord::try_from(snapshot).map_err(|e| corrupt(e.to_string()))
    }

    fn decode_rows(rows: &[PgRow]) -> Result<Vec<OrderTrackingRecord>, StoreError> {
        rows.iter().map(Self::decode_row).collect()
    }
}

#[async_trait]
impl TrackingStore for PostgresTrackingStore {
    async fn create(&self, record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError> {
        let items = Self::encode_items(record)?;

        let result = sqlx::query(
            r"
            INSERT INTO order_tracking (
                order_id, customer_id, status, payment_status, items,
                amount_paid, estimated_time, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(record.order_id)
        .bind(&record.customer_id)
        .bind(record.status.as_str())
        .bind(record.payment_status.as_str())
        .bind(items)
        .bind(record.amount_paid)
        .bind(record.estimated_time.map(|t| t.to_string()))
        .bind(record.updated_at)
        .bind(record.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record.clone()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateOrder(record.order_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<OrderTrackingRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM order_tracking WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn find_by_customer(&self, customer_id: &str) -> Result<Vec<OrderTrackingRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM order_tracking \
             WHERE customer_id = $1 \
             ORDER BY updated_at DESC, order_id DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Self::decode_rows(&rows)
    }

    async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderTrackingRecord>, StoreError> {
        let labels: Vec<&str> = statuses.iter().map(OrderStatus::as_str).collect();

        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM order_tracking \
             WHERE status = ANY($1) \
             ORDER BY updated_at ASC, order_id ASC"
        ))
        .bind(labels)
        .fetch_all(&self.pool)
        .await?;

        Self::decode_rows(&rows)
    }

    async fn update(&self, record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError> {
        let items = Self::encode_items(record)?;

        let new_version: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE order_tracking
            SET customer_id = $2, status = $3, payment_status = $4, items = $5,
                amount_paid = $6, estimated_time = $7, updated_at = $8,
                version = version + 1
            WHERE order_id = $1 AND version = $9
            RETURNING version
            ",
        )
        .bind(record.order_id)
        .bind(&record.customer_id)
        .bind(record.status.as_str())
        .bind(record.payment_status.as_str())
        .bind(items)
        .bind(record.amount_paid)
        .bind(record.estimated_time.map(|t| t.to_string()))
        .bind(record.updated_at)
        .bind(record.version)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(version) = new_version {
            let mut saved = record.clone();
            saved.version = version;
            return Ok(saved);
        }

        // Nothing matched: either the row is gone or someone else wrote first
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT version FROM order_tracking WHERE order_id = $1")
                .bind(record.order_id)
                .fetch_optional(&self.pool)
                .await?;

        match exists {
            Some(_) => Err(StoreError::VersionConflict {
                order_id: record.order_id,
                expected: record.version,
            }),
            None => Err(StoreError::NotFound(record.order_id)),
        }
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<OrderTrackingRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM order_tracking \
             ORDER BY order_id ASC OFFSET $1 LIMIT $2"
        ))
        .bind(offset.max(0))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Self::decode_rows(&rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
