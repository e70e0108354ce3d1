//! Signed webhook delivery and idempotent reconciliation.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use atelier_core::CheckoutSessionId;
use atelier_integration_tests::{TestApp, completed_session_event, sign};
use atelier_storefront::db::OrderRepository;
use axum::http::StatusCode;
use serde_json::json;

async fn order_count(app: &TestApp) -> usize {
    app.orders.list().await.unwrap().len()
}

#[tokio::test]
async fn test_invalid_signature_is_rejected_without_side_effects() {
    let app = TestApp::new();
    let payload = serde_json::to_vec(&completed_session_event("cs_bad", None)).unwrap();
    let now = chrono::Utc::now().timestamp();

    let (status, body) = app
        .webhook_with_signature(payload, &format!("t={now},v1={}", "0".repeat(64)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Webhook error"));
    assert_eq!(order_count(&app).await, 1);
}

#[tokio::test]
async fn test_signature_over_different_body_is_rejected() {
    let app = TestApp::new();
    let signed = serde_json::to_vec(&completed_session_event("cs_a", None)).unwrap();
    let delivered = serde_json::to_vec(&completed_session_event("cs_b", None)).unwrap();
    let signature = sign(&signed, chrono::Utc::now().timestamp());

    let (status, _) = app.webhook_with_signature(delivered, &signature).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(order_count(&app).await, 1);
}

#[tokio::test]
async fn test_stale_signature_is_rejected() {
    let app = TestApp::new();
    let payload = serde_json::to_vec(&completed_session_event("cs_old", None)).unwrap();
    let signature = sign(&payload, chrono::Utc::now().timestamp() - 3600);

    let (status, _) = app.webhook_with_signature(payload, &signature).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(order_count(&app).await, 1);
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let app = TestApp::new();
    let request = atelier_integration_tests::json_request(
        axum::http::Method::POST,
        "/api/webhooks/stripe",
        &completed_session_event("cs_unsigned", None),
    );

    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(order_count(&app).await, 1);
}

#[tokio::test]
async fn test_unhandled_event_is_acknowledged() {
    let app = TestApp::new();
    let event = json!({
        "id": "evt_1",
        "type": "payment_intent.created",
        "created": 1_760_000_000,
        "data": { "object": { "id": "pi_1" } }
    });

    let (status, body) = app.webhook(&event).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));
    assert_eq!(order_count(&app).await, 1);
}

#[tokio::test]
async fn test_completed_session_finalizes_existing_order() {
    let app = TestApp::new();

    let (status, body) = app
        .webhook(&completed_session_event("cs_existing", Some("1")))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "finalized");
    assert_eq!(body["order_id"], "1");

    let order = app
        .orders
        .find_by_idempotency_key(&CheckoutSessionId::new("cs_existing"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.id.as_str(), "1");
    assert_eq!(order.order_number, "MOCK-12345");
    assert_eq!(order_count(&app).await, 1);
}

#[tokio::test]
async fn test_completed_session_for_unknown_order_creates_one() {
    let app = TestApp::new();

    let (status, body) = app
        .webhook(&completed_session_event("cs_new", Some("ord_remote_7")))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "created");
    assert_eq!(body["order_id"], "ord_remote_7");

    let (status, order) = app.get("/orders/ord_remote_7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "processing");
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["total"], 49.99);
    assert_eq!(order["customer_email"], "shopper@example.com");
}

#[tokio::test]
async fn test_replayed_webhook_creates_one_order() {
    let app = TestApp::new();
    let event = completed_session_event("cs_replayed", None);

    let (_, first) = app.webhook(&event).await;
    let (status, second) = app.webhook(&event).await;
    let (_, third) = app.webhook(&event).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["outcome"], "created");
    assert_eq!(second["outcome"], "already_processed");
    assert_eq!(third["outcome"], "already_processed");
    assert_eq!(second["order_id"], first["order_id"]);
    assert_eq!(order_count(&app).await, 2);
}

#[tokio::test]
async fn test_concurrent_deliveries_reconcile_once() {
    let app = TestApp::new();
    let event = completed_session_event("cs_race", Some("ord_race"));

    let (a, b) = tokio::join!(app.webhook(&event), app.webhook(&event));

    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    let outcomes = [a.1["outcome"].clone(), b.1["outcome"].clone()];
    assert!(outcomes.contains(&json!("created")) || outcomes.contains(&json!("already_processed")));
    assert_eq!(order_count(&app).await, 2);
}
