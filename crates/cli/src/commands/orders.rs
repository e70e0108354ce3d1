//! Backend order commands.
//!
//! Talks to any server exposing the order API (`/orders/admin`,
//! `/orders/{id}`), including a local storefront.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_API_BASE_URL` - Backend API base URL
//! - `ATELIER_TOKEN_FILE` - Token file written by `atelier token set`

use std::path::PathBuf;
use std::sync::Arc;

use atelier_core::{Order, OrderId, OrderStatus};
use atelier_storefront::api::{ApiClient, ApiError};
use serde_json::json;
use thiserror::Error;

use super::token::{self, TokenError};

/// Errors from order commands.
#[derive(Debug, Error)]
pub enum OrdersError {
    #[error("Missing API URL: pass --api-url or set STOREFRONT_API_BASE_URL")]
    MissingApiUrl,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("API request failed: {0}")]
    Api(#[from] ApiError),

    #[error("Failed to format order: {0}")]
    Format(#[from] serde_json::Error),
}

/// Build an API client, authenticated when a token has been stored.
///
/// # Errors
///
/// Returns an error if no API URL is configured or no token location can be
/// found.
pub fn client(api_url: Option<String>, token_file: Option<PathBuf>) -> Result<ApiClient, OrdersError> {
    let base_url = api_url
        .filter(|url| !url.trim().is_empty())
        .ok_or(OrdersError::MissingApiUrl)?;
    let store = token::store(token_file)?;

    let client = ApiClient::new(base_url, Arc::new(store));
    if !client.has_token() {
        tracing::debug!("No API token stored, sending unauthenticated requests");
    }
    Ok(client)
}

fn order_endpoint(id: &OrderId) -> String {
    format!("/orders/{id}")
}

/// One-line summary of an order.
fn summary(order: &Order) -> String {
    format!(
        "{} {} {} {} total={} items={}",
        order.id,
        order.order_number,
        order.status,
        order.payment_status,
        order.total,
        order.item_count,
    )
}

/// List every order.
///
/// # Errors
///
/// Returns an error if the API request fails.
pub async fn list(client: &ApiClient) -> Result<(), OrdersError> {
    let orders: Vec<Order> = client.get("/orders/admin", None).await?;

    tracing::info!("{} order(s)", orders.len());
    for order in &orders {
        tracing::info!("{}", summary(order));
    }
    Ok(())
}

/// Show a single order as JSON.
///
/// # Errors
///
/// Returns an error if the API request fails or the order does not exist.
pub async fn get(client: &ApiClient, id: &OrderId) -> Result<(), OrdersError> {
    let order: Order = client.get(&order_endpoint(id), None).await?;
    tracing::info!("{}", serde_json::to_string_pretty(&order)?);
    Ok(())
}

/// Update an order's status.
///
/// # Errors
///
/// Returns an error if the API request fails or the order does not exist.
pub async fn set_status(
    client: &ApiClient,
    id: &OrderId,
    status: OrderStatus,
) -> Result<(), OrdersError> {
    let order = update_status(client, id, status).await?;
    tracing::info!("Updated: {}", summary(&order));
    Ok(())
}

async fn update_status(
    client: &ApiClient,
    id: &OrderId,
    status: OrderStatus,
) -> Result<Order, OrdersError> {
    let body = json!({ "status": status });
    Ok(client.put(&order_endpoint(id), &body).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use atelier_storefront::api::MemoryTokenStore;
    use secrecy::SecretString;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn order_json(status: &str) -> serde_json::Value {
        json!({
            "id": "1",
            "order_number": "MOCK-12345",
            "total": 129.99,
            "status": status,
            "payment_status": "paid",
            "created_at": "2026-01-15T10:30:00Z",
            "updated_at": "2026-01-15T10:30:00Z",
            "item_count": 2
        })
    }

    fn api(server: &MockServer) -> ApiClient {
        let store = MemoryTokenStore::with_token(Some(SecretString::from("tok_cli".to_string())));
        ApiClient::new(server.uri(), Arc::new(store))
    }

    #[test]
    fn test_client_requires_api_url() {
        assert!(matches!(
            client(None, Some(PathBuf::from("/tmp/atelier-none"))),
            Err(OrdersError::MissingApiUrl)
        ));
        assert!(matches!(
            client(Some("  ".to_string()), Some(PathBuf::from("/tmp/atelier-none"))),
            Err(OrdersError::MissingApiUrl)
        ));
    }

    #[test]
    fn test_summary_line() {
        let order: Order = serde_json::from_value(order_json("delivered")).unwrap();
        assert_eq!(
            summary(&order),
            "1 MOCK-12345 delivered paid total=129.99 items=2"
        );
    }

    #[tokio::test]
    async fn test_list_reads_admin_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/admin"))
            .and(header("authorization", "Bearer tok_cli"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([order_json("pending")])))
            .expect(1)
            .mount(&server)
            .await;

        list(&api(&server)).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_status_puts_status_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/orders/1"))
            .and(body_json(json!({ "status": "shipped" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(order_json("shipped")))
            .expect(1)
            .mount(&server)
            .await;

        let order = update_status(&api(&server), &OrderId::new("1"), OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_get_missing_order_surfaces_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/999"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "error": "Order not found" })),
            )
            .mount(&server)
            .await;

        let err = get(&api(&server), &OrderId::new("999")).await.unwrap_err();
        assert_eq!(err.to_string(), "API request failed: Order not found");
    }
}
