use actix::prelude::*;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context as _;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod actors;
mod api;
mod config;
mod domain;
mod messaging;
mod metrics;
mod store;
mod utils;

use actors::{CoordinatorActor, DlqActor, GetHealthMonitor, Shutdown};
use config::AppConfig;
use domain::tracking::ReconciliationService;
use messaging::{EventSource, RedpandaClient, RedpandaEventSource, RedpandaNotifier};
use store::PostgresTrackingStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // RUST_LOG wins when set, otherwise LOG_LEVEL applies
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!(
        service = %config.app.name,
        version = %config.app.version,
        "🚀 Starting order tracking service"
    );

    // === 1. Database ===
    tracing::info!("Connecting to Postgres...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;

    let store = PostgresTrackingStore::new(pool.clone());
    store.ensure_schema().await.context("Failed to create tracking schema")?;
    DlqActor::ensure_schema(&pool)
        .await
        .context("Failed to create DLQ schema")?;

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let registry = metrics.registry().clone();
    let (metrics_host, metrics_port) = (config.server.host.clone(), config.server.metrics_port);
    actix_web::rt::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(registry, metrics_host, metrics_port).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 3. Redpanda producer (with circuit breaker) and notifier ===
    let redpanda = Arc::new(RedpandaClient::new(&config.redpanda.brokers)?);
    let notifier = Arc::new(RedpandaNotifier::new(
        redpanda.clone(),
        config.redpanda.notification_topic.clone(),
    ));

    let service = Arc::new(ReconciliationService::new(Arc::new(store), notifier));

    // === 4. One consumer per topic ===
    let mut sources: Vec<Arc<dyn EventSource>> = Vec::new();
    for topic in config.redpanda.consumed_topics() {
        let source = RedpandaEventSource::new(
            &config.redpanda.brokers,
            &config.redpanda.group_id,
            topic,
            &config.redpanda.auto_offset_reset,
        )?;
        sources.push(Arc::new(source));
    }

    // === 5. Coordinator (supervises consumers, DLQ and health) ===
    tracing::info!("Starting coordinator actor with supervision");
    let coordinator = CoordinatorActor::new(
        pool,
        service.clone(),
        metrics.clone(),
        Some(redpanda),
        sources,
    )
    .start();

    let health_monitor = coordinator.send(GetHealthMonitor).await?;

    // === 6. HTTP API ===
    let state = web::Data::new(api::ApiState {
        service,
        app: config.app.clone(),
        health_monitor,
    });

    tracing::info!(
        "🌐 Tracking API listening on http://{}:{}/tracking",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(api::configure)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    // HTTP server returns on SIGINT/SIGTERM
    if let Err(e) = coordinator.send(Shutdown).await? {
        tracing::error!("Coordinator shutdown failed: {}", e);
    }

    tracing::info!("👋 Order tracking service stopped");
    Ok(())
}
