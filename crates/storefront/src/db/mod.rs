//! Order storage.
//!
//! Route handlers and the webhook reconciler see orders only through
//! [`OrderRepository`]. Two implementations exist:
//!
//! - [`InMemoryOrderRepository`] - the default, seeded with one demo order
//! - [`PgOrderRepository`] - `PostgreSQL`, used when a database URL is configured
//!
//! # Database: `storefront`
//!
//! ## Tables
//!
//! - `storefront.orders` - one row per order; the full order is kept as a
//!   JSONB document next to indexed `status`, `payment_status` and
//!   `idempotency_key` columns
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p atelier-cli -- migrate
//! ```

mod memory;
mod postgres;

pub use memory::InMemoryOrderRepository;
pub use postgres::PgOrderRepository;

use std::time::Duration;

use async_trait::async_trait;
use atelier_core::{CheckoutSessionId, Order, OrderId, OrderStatus};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate idempotency key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Order persistence.
///
/// Implementations must be safe to share across request handlers.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// All orders in insertion order.
    async fn list(&self) -> Result<Vec<Order>, RepositoryError>;

    /// The order with `id`, if any.
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Insert or replace an order, keyed by its id.
    ///
    /// Returns `RepositoryError::Conflict` if another order already carries
    /// the same idempotency key.
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    /// The order finalized by checkout session `key`, if any.
    async fn find_by_idempotency_key(
        &self,
        key: &CheckoutSessionId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Set the status of one order, leaving every other field unchanged.
    ///
    /// Returns the updated order, or `None` if no order has `id`.
    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Mark one order paid by checkout session `key` in a single write,
    /// filling a missing customer email from `email`. Status changes made by
    /// other writers are kept.
    ///
    /// Returns the updated order, or `None` if no order has `id`. Returns
    /// `RepositoryError::Conflict` if another order already carries `key`.
    async fn mark_paid(
        &self,
        id: &OrderId,
        key: &CheckoutSessionId,
        email: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Whether the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
