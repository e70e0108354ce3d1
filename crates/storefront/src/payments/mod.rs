//! Payment processor integration.
//!
//! The checkout flow only needs one thing from a processor: a hosted
//! checkout session to redirect the shopper to. [`PaymentProcessor`] is that
//! seam; [`StripeClient`] is the production implementation. Completed
//! payments come back asynchronously through the webhook, verified by
//! [`StripeWebhookVerifier`].

mod stripe;
mod webhook;

pub use stripe::{DEFAULT_API_BASE, StripeClient};
pub use webhook::{
    CHECKOUT_SESSION_COMPLETED, CompletedCheckoutSession, CustomerDetails, Event, EventData,
    StripeWebhookVerifier, WebhookError,
};

use std::collections::BTreeMap;

use async_trait::async_trait;
use atelier_core::{CheckoutSessionId, CountryCode, CurrencyCode, Email};
use thiserror::Error;

/// Errors talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The request never produced a response.
    #[error("payment processor request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The processor rejected the request.
    #[error("payment processor returned {status}: {message}")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },

    /// The processor's response did not have the expected shape.
    #[error("invalid payment processor response: {0}")]
    InvalidResponse(String),
}

/// One line on a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub image: Option<String>,
    pub currency: CurrencyCode,
    /// Price per unit in minor units (cents).
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Everything needed to open a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub allowed_countries: Vec<CountryCode>,
    pub customer_email: Option<Email>,
    /// Opaque reference echoed back in the webhook; carries the order id.
    pub client_reference_id: String,
    pub metadata: BTreeMap<String, String>,
    /// Sent as the processor's idempotency key so a retried request does not
    /// open a second session.
    pub idempotency_key: String,
}

/// A hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CheckoutSession {
    pub id: CheckoutSessionId,
    pub url: String,
}

/// A processor that can open hosted checkout sessions.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Open a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the processor cannot be reached or rejects
    /// the request.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}
