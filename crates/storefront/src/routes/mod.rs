//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness check
//! GET  /health/ready                   - Readiness check (order store)
//!
//! # Orders
//! GET  /orders/admin                   - All orders
//! GET  /orders/{id}                    - Order detail
//! PUT  /orders/{id}                    - Update order status
//! POST /orders                         - Create order
//!
//! # Checkout
//! POST /api/checkout/validate-address  - Address validation
//! POST /api/checkout/session           - Start hosted checkout
//! GET  /api/checkout/config            - Client checkout configuration
//!
//! # Webhooks
//! POST /api/webhooks/stripe            - Stripe events
//! ```

pub mod checkout;
pub mod health;
pub mod orders;
pub mod webhooks;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create the main routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(orders::router())
        .merge(checkout::router())
        .merge(webhooks::router())
}
