//! Order route handlers.
//!
//! ```text
//! GET  /orders/admin  - All orders, insertion order
//! GET  /orders/{id}   - One order; 404 when absent
//! PUT  /orders/{id}   - Update status only: {"status": "shipped"}
//! POST /orders        - Create from any JSON object; 201
//! ```

use std::str::FromStr;

use atelier_core::{NewOrder, Order, OrderId, OrderStatus, order_number_at};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Body for `PUT /orders/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: String,
}

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/admin", get(list_orders))
        .route("/orders/{id}", get(get_order).put(update_order))
}

fn not_found() -> AppError {
    AppError::NotFound("Order not found".to_string())
}

/// List every order.
#[instrument(skip(state))]
pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list().await?))
}

/// Get one order, with a placeholder line when it has none.
#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let order = state
        .orders()
        .find_by_id(&OrderId::new(id))
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(order.with_placeholder_items()))
}

/// Update the status of one order.
#[instrument(skip(state, body))]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<Json<Order>> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let status = OrderStatus::from_str(&body.status).map_err(AppError::BadRequest)?;

    let order = state
        .orders()
        .update_status(&OrderId::new(id), status)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(order_id = %order.id, status = %status, "Order status updated");
    Ok(Json(order))
}

/// Create an order from an arbitrary JSON object.
#[instrument(skip(state, body))]
pub async fn create_order(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>)> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let now = Utc::now();
    let order = body
        .into_order(OrderId::generate(), order_number_at(now), now)
        .map_err(|e| AppError::BadRequest(format!("invalid order: {e}")))?;
    state.orders().save(&order).await?;

    tracing::info!(order_id = %order.id, order_number = %order.order_number, "Order created");
    Ok((StatusCode::CREATED, Json(order)))
}
