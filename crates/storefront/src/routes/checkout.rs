//! Checkout API handlers.
//!
//! ```text
//! POST /api/checkout/validate-address - Validate a partial address
//! POST /api/checkout/session          - Create order (if needed) and payment session
//! GET  /api/checkout/config           - Publishable key and currency for the client
//! ```

use atelier_core::{AddressInput, AddressValidation, CheckoutData, CurrencyCode};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::BegunCheckout;
use crate::state::AppState;

/// Response for `GET /api/checkout/config`.
#[derive(Debug, Serialize)]
pub struct CheckoutConfigResponse {
    pub publishable_key: String,
    pub currency: CurrencyCode,
}

/// Build the checkout router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/checkout/validate-address", post(validate_address))
        .route("/api/checkout/session", post(create_session))
        .route("/api/checkout/config", get(config))
}

/// Validate a (possibly partial) shipping address.
pub async fn validate_address(
    State(state): State<AppState>,
    body: std::result::Result<Json<AddressInput>, JsonRejection>,
) -> Result<Json<AddressValidation>> {
    let Json(address) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(Json(state.checkout().validate_address(&address).await))
}

/// Start a checkout: returns the order id and the hosted checkout URL.
#[instrument(skip(state, body))]
pub async fn create_session(
    State(state): State<AppState>,
    body: std::result::Result<Json<CheckoutData>, JsonRejection>,
) -> Result<Json<BegunCheckout>> {
    let Json(data) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(Json(state.checkout().begin_checkout(data).await?))
}

/// Client-side checkout configuration.
pub async fn config(State(state): State<AppState>) -> Json<CheckoutConfigResponse> {
    Json(CheckoutConfigResponse {
        publishable_key: state.config().stripe.publishable_key.clone(),
        currency: state.config().checkout.currency,
    })
}
