//! Stripe webhook signature verification and event payloads.
//!
//! Stripe signs each delivery with a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The HMAC-SHA256 is
//! computed over `"{t}.{raw body}"` with the endpoint's signing secret.

use std::collections::BTreeMap;

use atelier_core::{CheckoutSessionId, OrderId};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Event type the storefront reconciles.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Maximum age of a signed timestamp, in seconds.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Allowed clock skew for timestamps from the future, in seconds.
const FUTURE_SKEW_SECS: i64 = 60;

/// Errors verifying or parsing a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing Stripe-Signature header")]
    MissingSignature,

    #[error("malformed Stripe-Signature header")]
    MalformedSignature,

    #[error("invalid timestamp in signature")]
    InvalidTimestamp,

    #[error("signature timestamp outside tolerance (age {age}s)")]
    TimestampOutOfTolerance { age: i64 },

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("webhook signing secret is unusable")]
    InvalidSecret,

    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Verifies `Stripe-Signature` headers with the endpoint signing secret.
#[derive(Clone)]
pub struct StripeWebhookVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for StripeWebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeWebhookVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl StripeWebhookVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSecret)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Verify a delivery against the current time.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError` if the header is malformed, the timestamp is
    /// outside tolerance, or no `v1` signature matches.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), WebhookError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verify a delivery as of `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify).
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                Some(_) => {}
                None => return Err(WebhookError::MalformedSignature),
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::MalformedSignature)?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedSignature);
        }

        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;
        let age = now
            .checked_sub(signed_at)
            .ok_or(WebhookError::InvalidTimestamp)?;
        if age > TIMESTAMP_TOLERANCE_SECS || age < -FUTURE_SKEW_SECS {
            tracing::warn!(age, "Stripe webhook rejected: timestamp outside tolerance");
            return Err(WebhookError::TimestampOutOfTolerance { age });
        }

        let mut matched = false;
        for candidate in signatures {
            let Ok(bytes) = hex::decode(candidate) else {
                continue;
            };
            if self.mac(timestamp, payload)?.verify_slice(&bytes).is_ok() {
                matched = true;
                break;
            }
        }

        if matched {
            Ok(())
        } else {
            Err(WebhookError::SignatureMismatch)
        }
    }

    /// Produce a `Stripe-Signature` header value for `payload` at `timestamp`.
    ///
    /// Used to send test deliveries to a local server.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidSecret` if the secret cannot key the HMAC.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, WebhookError> {
        let signature = hex::encode(
            self.mac(&timestamp.to_string(), payload)?
                .finalize()
                .into_bytes(),
        );
        Ok(format!("t={timestamp},v1={signature}"))
    }
}

/// A Stripe event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    /// Parse an event from a verified request body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Payload` if the body is not an event.
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// The completed checkout session, for `checkout.session.completed` events.
    ///
    /// Returns `Ok(None)` for every other event type.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Payload` if the event object is not a session.
    pub fn completed_checkout_session(
        &self,
    ) -> Result<Option<CompletedCheckoutSession>, WebhookError> {
        if self.event_type != CHECKOUT_SESSION_COMPLETED {
            return Ok(None);
        }
        Ok(Some(CompletedCheckoutSession::deserialize(
            &self.data.object,
        )?))
    }
}

/// `data.object` of a `checkout.session.completed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedCheckoutSession {
    pub id: CheckoutSessionId,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Total charged, in minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

impl CompletedCheckoutSession {
    /// Order this session was opened for: `metadata.order_id`, else the
    /// client reference id.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        let non_empty = |id: &&String| !id.is_empty();
        self.metadata
            .as_ref()
            .and_then(|m| m.get("order_id"))
            .filter(non_empty)
            .or_else(|| self.client_reference_id.as_ref().filter(non_empty))
            .map(|id| OrderId::new(id.as_str()))
    }

    /// Customer email from the session or the collected customer details.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref()?.email.as_deref())
    }
}
