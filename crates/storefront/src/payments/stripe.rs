//! Stripe Checkout client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::{CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentProcessor};

/// Production Stripe API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Client for Stripe's hosted Checkout.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a client against `api_base` (normally [`DEFAULT_API_BASE`]).
    #[must_use]
    pub fn new(api_base: impl Into<String>, secret_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key,
        }
    }
}

/// Flatten a session request into Stripe's bracketed form encoding.
fn session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            "client_reference_id".to_string(),
            request.client_reference_id.clone(),
        ),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            item.currency.as_str().to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        if let Some(image) = &item.image {
            form.push((
                format!("{prefix}[price_data][product_data][images][0]"),
                image.clone(),
            ));
        }
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    for (i, country) in request.allowed_countries.iter().enumerate() {
        form.push((
            format!("shipping_address_collection[allowed_countries][{i}]"),
            country.as_str().to_string(),
        ));
    }

    if let Some(email) = &request.customer_email {
        form.push(("customer_email".to_string(), email.as_str().to_string()));
    }

    for (key, value) in &request.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }

    form
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    #[instrument(
        skip(self, request),
        fields(
            client_reference_id = %request.client_reference_id,
            line_items = request.line_items.len()
        )
    )]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(self.secret_key.expose_secret(), None::<&str>)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&session_form(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            tracing::warn!(status = %status, message = %message, "Stripe rejected checkout session");
            return Err(PaymentError::Rejected { status, message });
        }

        let session: CreateCheckoutSessionResponse = response.json().await?;
        let url = session.url.ok_or_else(|| {
            PaymentError::InvalidResponse(format!("session {} has no redirect url", session.id))
        })?;

        tracing::info!(session_id = %session.id, "Checkout session created");
        Ok(CheckoutSession {
            id: session.id.into(),
            url,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use atelier_core::{CountryCode, CurrencyCode, Email};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::payments::LineItem;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            line_items: vec![
                LineItem {
                    name: "Wool Coat".to_string(),
                    image: Some("https://cdn.atelier.shop/coat.jpg".to_string()),
                    currency: CurrencyCode::Usd,
                    unit_amount: 24_999,
                    quantity: 1,
                },
                LineItem {
                    name: "Scarf".to_string(),
                    image: None,
                    currency: CurrencyCode::Usd,
                    unit_amount: 4_500,
                    quantity: 2,
                },
            ],
            success_url: "https://atelier.shop/checkout/success".to_string(),
            cancel_url: "https://atelier.shop/checkout".to_string(),
            allowed_countries: vec![CountryCode::resolve("UK").unwrap()],
            customer_email: Some(Email::parse("ada@example.com").unwrap()),
            client_reference_id: "order-1".to_string(),
            metadata: BTreeMap::from([("order_id".to_string(), "order-1".to_string())]),
            idempotency_key: "checkout-order-1".to_string(),
        }
    }

    #[test]
    fn test_session_form_flattens_line_items() {
        let form: BTreeMap<String, String> = session_form(&request()).into_iter().collect();
        assert_eq!(form["mode"], "payment");
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "24999");
        assert_eq!(
            form["line_items[0][price_data][product_data][images][0]"],
            "https://cdn.atelier.shop/coat.jpg"
        );
        assert_eq!(form["line_items[1][quantity]"], "2");
        assert!(!form.contains_key("line_items[1][price_data][product_data][images][0]"));
        assert!(!form.contains_key("line_items[2][quantity]"));
        assert_eq!(form["shipping_address_collection[allowed_countries][0]"], "GB");
        assert_eq!(form["customer_email"], "ada@example.com");
        assert_eq!(form["metadata[order_id]"], "order-1");
        assert_eq!(form["client_reference_id"], "order-1");
    }

    #[tokio::test]
    async fn test_create_checkout_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("Idempotency-Key", "checkout-order-1"))
            .and(header_exists("authorization"))
            .and(body_string_contains("client_reference_id=order-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_123",
                "url": "https://checkout.stripe.com/c/pay/cs_test_123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = StripeClient::new(server.uri(), SecretString::from("sk_test_123"));
        let session = client.create_checkout_session(&request()).await.unwrap();
        assert_eq!(session.id.as_str(), "cs_test_123");
        assert_eq!(session.url, "https://checkout.stripe.com/c/pay/cs_test_123");
    }

    #[tokio::test]
    async fn test_rejection_surfaces_stripe_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Invalid currency: xyz", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let client = StripeClient::new(server.uri(), SecretString::from("sk_test_123"));
        let err = client.create_checkout_session(&request()).await.unwrap_err();
        match err {
            PaymentError::Rejected { status, message } => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(message, "Invalid currency: xyz");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_url_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cs_test_9"})))
            .mount(&server)
            .await;

        let client = StripeClient::new(server.uri(), SecretString::from("sk_test_123"));
        let err = client.create_checkout_session(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidResponse(_)));
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let client = StripeClient::new(DEFAULT_API_BASE, SecretString::from("sk_live_supersecret"));
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk_live_supersecret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
