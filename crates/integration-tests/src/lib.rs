//! Integration tests for the Atelier storefront.
//!
//! Tests drive the full axum application in-process with
//! `tower::ServiceExt::oneshot`; no server or database is needed. Orders
//! live in the seeded in-memory repository, the payment processor is a
//! recording fake, and the backend API is a `wiremock` server when a test
//! needs one.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p atelier-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `orders` - Order routes against the seeded store
//! - `checkout` - Checkout session flow with a fake processor
//! - `webhooks` - Signed webhook delivery and idempotent reconciliation
//! - `health` - Liveness, readiness, request IDs

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use atelier_core::{CheckoutSessionId, CurrencyCode};
use atelier_storefront::api::{ApiClient, MemoryTokenStore};
use atelier_storefront::config::{BackendApiConfig, CheckoutConfig, StorefrontConfig, StripeConfig};
use atelier_storefront::db::{InMemoryOrderRepository, OrderRepository};
use atelier_storefront::payments::{
    CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentProcessor, StripeWebhookVerifier,
};
use atelier_storefront::routes::webhooks::STRIPE_SIGNATURE_HEADER;
use atelier_storefront::services::CountryPolicy;
use atelier_storefront::state::AppState;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

/// Webhook signing secret used by every test app.
pub const WEBHOOK_SECRET: &str = "whsec_integration_test";

/// Configuration for a test app whose backend API lives at `api_base_url`.
#[must_use]
pub fn test_config(api_base_url: &str, country_policy: CountryPolicy) -> StorefrontConfig {
    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: "https://shop.test".to_string(),
        api: BackendApiConfig {
            base_url: api_base_url.to_string(),
            token: Some(SecretString::from("tok_integration".to_string())),
        },
        database_url: None,
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_integration".to_string()),
            webhook_secret: SecretString::from(WEBHOOK_SECRET.to_string()),
            publishable_key: "pk_test_integration".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
        },
        checkout: CheckoutConfig {
            currency: CurrencyCode::default(),
            country_policy,
        },
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Payment processor that records requests and answers with numbered sessions.
#[derive(Default)]
pub struct FakeProcessor {
    requests: Mutex<Vec<CheckoutSessionRequest>>,
}

impl FakeProcessor {
    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        requests.push(request.clone());
        let id = format!("cs_test_{}", requests.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/pay/{id}"),
            id: CheckoutSessionId::new(id),
        })
    }
}

/// A storefront app wired to in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub orders: Arc<InMemoryOrderRepository>,
    pub processor: Arc<FakeProcessor>,
}

impl TestApp {
    /// App with the seeded order store and no reachable backend API.
    #[must_use]
    pub fn new() -> Self {
        Self::with_api("http://127.0.0.1:9", CountryPolicy::default())
    }

    /// App whose backend API is at `api_base_url`.
    #[must_use]
    pub fn with_api(api_base_url: &str, country_policy: CountryPolicy) -> Self {
        let config = test_config(api_base_url, country_policy);
        let orders = Arc::new(InMemoryOrderRepository::seeded());
        let processor = Arc::new(FakeProcessor::default());

        let token_store = Arc::new(MemoryTokenStore::with_token(config.api.token.clone()));
        let api = ApiClient::new(config.api.base_url.clone(), token_store);

        let repository: Arc<dyn OrderRepository> = orders.clone();
        let payments: Arc<dyn PaymentProcessor> = processor.clone();
        let state = AppState::new(config, repository, api, payments);

        Self {
            router: atelier_storefront::app(state),
            orders,
            processor,
        }
    }

    /// Send a request and return the status and body (JSON, or a JSON string
    /// for non-JSON bodies).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(&self, method: Method, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.send(json_request(method, uri, body)).await
    }

    /// Deliver a webhook signed with the test secret at the current time.
    pub async fn webhook(&self, event: &Value) -> (StatusCode, Value) {
        let payload = serde_json::to_vec(event).unwrap();
        let signature = sign(&payload, chrono::Utc::now().timestamp());
        self.webhook_with_signature(payload, &signature).await
    }

    /// Deliver a webhook with an explicit signature header.
    pub async fn webhook_with_signature(
        &self,
        payload: Vec<u8>,
        signature: &str,
    ) -> (StatusCode, Value) {
        let request = Request::post("/api/webhooks/stripe")
            .header(header::CONTENT_TYPE, "application/json")
            .header(STRIPE_SIGNATURE_HEADER, signature)
            .body(Body::from(payload))
            .unwrap();
        self.send(request).await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A request with a JSON body.
#[must_use]
pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// `Stripe-Signature` header for `payload` under the test secret.
#[must_use]
pub fn sign(payload: &[u8], timestamp: i64) -> String {
    StripeWebhookVerifier::new(SecretString::from(WEBHOOK_SECRET.to_string()))
        .sign(payload, timestamp)
        .unwrap()
}

/// A `checkout.session.completed` event for `session_id`.
#[must_use]
pub fn completed_session_event(session_id: &str, order_id: Option<&str>) -> Value {
    let mut session = serde_json::json!({
        "id": session_id,
        "object": "checkout.session",
        "amount_total": 4999,
        "currency": "usd",
        "payment_status": "paid",
        "customer_details": { "email": "shopper@example.com" },
    });
    if let Some(order_id) = order_id {
        session["client_reference_id"] = order_id.into();
        session["metadata"] = serde_json::json!({ "order_id": order_id });
    }

    serde_json::json!({
        "id": format!("evt_{session_id}"),
        "type": "checkout.session.completed",
        "created": 1_760_000_000,
        "data": { "object": session },
    })
}
