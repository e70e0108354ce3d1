//! Payment processor webhooks.
//!
//! ```text
//! POST /api/webhooks/stripe - Stripe event delivery (signed)
//! ```
//!
//! Signature failures answer 400 with no side effects. Repository failures
//! answer 500 so Stripe retries; reconciliation is idempotent, so retries
//! are safe.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde::Serialize;
use tracing::instrument;

use crate::error::Result;
use crate::payments::{Event, WebhookError};
use crate::state::AppState;

/// Stripe's signature header.
pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Acknowledgement returned to the processor.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl WebhookAck {
    const fn received() -> Self {
        Self {
            received: true,
            outcome: None,
            order_id: None,
        }
    }
}

/// Build the webhooks router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/webhooks/stripe", post(stripe_webhook))
}

/// Verify, parse, and reconcile a Stripe event.
#[instrument(
    skip_all,
    fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty)
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    if let Err(e) = state.webhook_verifier().verify(&body, signature) {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        return Err(e.into());
    }

    let event = Event::parse(&body)?;
    let span = tracing::Span::current();
    span.record("event_id", event.id.as_str());
    span.record("event_type", event.event_type.as_str());

    let Some(session) = event.completed_checkout_session()? else {
        tracing::debug!("Ignoring unhandled event type");
        return Ok(Json(WebhookAck::received()));
    };

    let outcome = state.reconciler().reconcile(&session).await?;
    Ok(Json(WebhookAck {
        received: true,
        outcome: Some(outcome.as_str()),
        order_id: Some(outcome.order_id().to_string()),
    }))
}
