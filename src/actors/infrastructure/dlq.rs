use actix::prelude::*;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

// ============================================================================
// Dead Letter Queue Actor
// ============================================================================
//
// Holds consumer messages that could not be applied:
// - payloads that do not parse or carry an unknown event type
// - events whose transient failure outlived every retry
//
// Rows keep the raw payload so an operator can inspect and replay them.
//
// ============================================================================

pub struct DlqActor {
    pool: PgPool,
}

impl DlqActor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dead_letter_queue (
                id UUID PRIMARY KEY,
                source VARCHAR(255) NOT NULL,
                event_type VARCHAR(100) NOT NULL,
                payload TEXT NOT NULL,
                error_message TEXT NOT NULL,
                failure_count INTEGER NOT NULL,
                first_failed_at TIMESTAMPTZ NOT NULL,
                last_failed_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_dead_letter_queue_event_type
             ON dead_letter_queue (event_type)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

impl Actor for DlqActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("DlqActor started - Dead Letter Queue ready");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), String>")]
pub struct AddToDlq {
    pub id: Uuid,
    /// Topic the message was consumed from.
    pub source: String,
    pub event_type: String,
    pub payload: String,
    pub error_message: String,
    pub failure_count: i32,
    pub first_failed_at: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<AddToDlq> for DlqActor {
    type Result = ResponseFuture<Result<(), String>>;

    fn handle(&mut self, msg: AddToDlq, _: &mut Self::Context) -> Self::Result {
        let pool = self.pool.clone();

        tracing::error!(
            dlq_id = %msg.id,
            source = %msg.source,
            event_type = %msg.event_type,
            error = %msg.error_message,
            failure_count = msg.failure_count,
            "💀 Adding message to Dead Letter Queue"
        );

        Box::pin(async move {
            sqlx::query(
                "INSERT INTO dead_letter_queue (
                    id, source, event_type, payload, error_message,
                    failure_count, first_failed_at, last_failed_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(msg.id)
            .bind(&msg.source)
            .bind(&msg.event_type)
            .bind(&msg.payload)
            .bind(&msg.error_message)
            .bind(msg.failure_count)
            .bind(msg.first_failed_at)
            .bind(Utc::now())
            .execute(&pool)
            .await
            .map_err(|e| format!("Failed to insert into DLQ: {}", e))?;

            tracing::info!(dlq_id = %msg.id, "Message successfully stored in DLQ");
            Ok(())
        })
    }
}
