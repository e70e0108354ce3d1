//! `PostgreSQL` order storage.
//!
//! The full order is stored as JSONB so pass-through fields survive a round
//! trip. `status`, `payment_status` and `idempotency_key` are mirrored into
//! columns; the columns win when the two disagree.

use async_trait::async_trait;
use atelier_core::{CheckoutSessionId, Order, OrderId, OrderStatus, PaymentStatus};
use chrono::Utc;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{OrderRepository, RepositoryError};

/// Raw row from `storefront.orders`.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    document: Json<Order>,
    status: OrderStatus,
    payment_status: PaymentStatus,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        let mut order = row.document.0;
        order.status = row.status;
        order.payment_status = row.payment_status;
        order
    }
}

/// Map a unique violation on the idempotency key to `Conflict`.
fn map_write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict("idempotency key already used".to_owned());
    }
    RepositoryError::Database(e)
}

/// Orders in `storefront.orders`.
#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT document, status, payment_status
            FROM storefront.orders
            ORDER BY seq
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT document, status, payment_status
            FROM storefront.orders
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.orders
                (id, order_number, status, payment_status, idempotency_key,
                 document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                order_number = EXCLUDED.order_number,
                status = EXCLUDED.status,
                payment_status = EXCLUDED.payment_status,
                idempotency_key = EXCLUDED.idempotency_key,
                document = EXCLUDED.document,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.idempotency_key.as_ref())
        .bind(Json(order))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &CheckoutSessionId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT document, status, payment_status
            FROM storefront.orders
            WHERE idempotency_key = $1
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT document, status, payment_status
            FROM storefront.orders
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut order = Order::from(row);
        order.status = status;

        sqlx::query(
            r"
            UPDATE storefront.orders
            SET status = $2, document = $3, updated_at = $4
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .bind(Json(&order))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(order))
    }

    async fn mark_paid(
        &self,
        id: &OrderId,
        key: &CheckoutSessionId,
        email: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT document, status, payment_status
            FROM storefront.orders
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut order = Order::from(row);
        order.mark_paid(key.clone(), Utc::now());
        if order.customer_email.is_none() {
            order.customer_email = email.map(String::from);
        }

        sqlx::query(
            r"
            UPDATE storefront.orders
            SET status = $2, payment_status = $3, idempotency_key = $4,
                document = $5, updated_at = $6
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(key)
        .bind(Json(&order))
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;
        Ok(Some(order))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
