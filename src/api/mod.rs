// ============================================================================
// HTTP API - Tracking endpoints
// ============================================================================
//
// Customer and kitchen views over the tracking records, the kitchen status
// command, and event ingestion for upstream services without a broker.
//
// Fixed segments (health, queue, customer, events) are registered before
// `/{order_id}` so they are never read as an order id.
//
// ============================================================================

mod dto;
mod error;
mod handlers;

use actix_web::web;

use error::ApiError;

pub use handlers::ApiState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/tracking")
            .route("", web::get().to(handlers::list_tracking))
            .route("/health", web::get().to(handlers::health))
            .route("/queue", web::get().to(handlers::kitchen_queue))
            .route("/customer/{cpf}", web::get().to(handlers::customer_orders))
            .route("/events/order", web::post().to(handlers::ingest_order_event))
            .route("/events/payment", web::post().to(handlers::ingest_payment_event))
            .route("/{order_id}", web::get().to(handlers::get_tracking))
            .route("/{order_id}/status", web::put().to(handlers::update_status)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppInfo;
    use crate::domain::tracking::{NoopNotifier, ReconciliationService};
    use crate::store::InMemoryTrackingStore;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn state() -> web::Data<ApiState> {
        web::Data::new(ApiState {
            service: Arc::new(ReconciliationService::new(
                Arc::new(InMemoryTrackingStore::new()),
                Arc::new(NoopNotifier),
            )),
            app: AppInfo {
                name: "order-tracking".to_string(),
                version: "0.1.0".to_string(),
            },
            health_monitor: None,
        })
    }

    fn order_body(order_id: i64, customer_id: &str) -> Value {
        json!({
            "id_order": order_id,
            "customer_id": customer_id,
            "items": [{"id": 1, "quantity": 1, "category": "LANCHE"}],
            "total_amount": 25.0,
            "status": "Recebido"
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn test_health_reports_service_identity() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/tracking/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "order-tracking");
        assert_eq!(body["components"]["database"]["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_order_lifecycle_over_http() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/tracking/events/order")
            .set_json(order_body(500, "123.456.789-01"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "Recebido");

        let req = test::TestRequest::post()
            .uri("/tracking/events/payment")
            .set_json(json!({"id_payment": 9, "id_order": 500, "status": "pago", "amount": 25.0}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["payment_status"], "pago");

        let req = test::TestRequest::get().uri("/tracking/queue").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["orders"][0]["status"], "Em preparação");

        let req = test::TestRequest::put()
            .uri("/tracking/500/status")
            .set_json(json!({"status": "Pronto"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "Pronto");
        assert_eq!(body["estimated_time"], "00:20:00");

        let req = test::TestRequest::get().uri("/tracking/500").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["payment_status"], "pago");
        assert_eq!(body["amount_paid"], 25.0);
    }

    #[actix_web::test]
    async fn test_unknown_order_is_404() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/tracking/404").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error_code"], "TRACKING_NOT_FOUND");
        assert_eq!(body["error_type"], "NotFound");
    }

    #[actix_web::test]
    async fn test_illegal_transition_is_400() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/tracking/events/order")
            .set_json(order_body(7, "12345678901"))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::put()
            .uri("/tracking/7/status")
            .set_json(json!({"status": "Finalizado"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error_code"], "INVALID_STATUS_TRANSITION");
    }

    #[actix_web::test]
    async fn test_customer_history_normalizes_cpf() {
        let state = state();
        let app = app!(state);

        for order_id in [1, 2] {
            let req = test::TestRequest::post()
                .uri("/tracking/events/order")
                .set_json(order_body(order_id, "12345678901"))
                .to_request();
            test::call_service(&app, req).await;
        }

        let req = test::TestRequest::get()
            .uri("/tracking/customer/123.456.789-01")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let req = test::TestRequest::get().uri("/tracking/customer/123").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error_code"], "INVALID_CPF");
    }

    #[actix_web::test]
    async fn test_payment_for_unknown_order_is_404() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/tracking/events/payment")
            .set_json(json!({"id_payment": "p1", "id_order": 77, "status": "pago"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_list_is_paginated() {
        let state = state();
        let app = app!(state);

        for order_id in 1..=5 {
            let req = test::TestRequest::post()
                .uri("/tracking/events/order")
                .set_json(order_body(order_id, "12345678901"))
                .to_request();
            test::call_service(&app, req).await;
        }

        let req = test::TestRequest::get()
            .uri("/tracking?offset=1&limit=2")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let ids: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id_order"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[actix_web::test]
    async fn test_empty_items_are_rejected() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/tracking/events/order")
            .set_json(json!({"id_order": 3, "customer_id": "12345678901", "items": []}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
    }
}
