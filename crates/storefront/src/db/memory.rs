//! Process-lifetime order storage.

use async_trait::async_trait;
use atelier_core::{CheckoutSessionId, Order, OrderId, OrderStatus, PaymentStatus};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Map;
use tokio::sync::RwLock;

use super::{OrderRepository, RepositoryError};

/// Orders held in memory, lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderRepository {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository holding `orders`, in order.
    #[must_use]
    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: RwLock::new(orders),
        }
    }

    /// A repository holding the demo order `1` (`MOCK-12345`, delivered, paid).
    #[must_use]
    pub fn seeded() -> Self {
        let now = Utc::now();
        Self::with_orders(vec![Order {
            id: OrderId::new("1"),
            order_number: "MOCK-12345".to_string(),
            total: Decimal::new(12_999, 2),
            status: OrderStatus::Delivered,
            payment_status: PaymentStatus::Paid,
            created_at: now,
            updated_at: now,
            customer_name: Some("Jane Doe".to_string()),
            customer_email: Some("jane.doe@example.com".to_string()),
            item_count: 1,
            items: None,
            shipping_address: None,
            billing_address: None,
            idempotency_key: None,
            extra: Map::new(),
        }])
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.orders.read().await.clone())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .find(|o| &o.id == id)
            .cloned())
    }

    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;

        if let Some(key) = &order.idempotency_key
            && orders
                .iter()
                .any(|o| o.id != order.id && o.idempotency_key.as_ref() == Some(key))
        {
            return Err(RepositoryError::Conflict(format!(
                "idempotency key {key} already used"
            )));
        }

        match orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order.clone(),
            None => orders.push(order.clone()),
        }
        Ok(())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &CheckoutSessionId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .find(|o| o.idempotency_key.as_ref() == Some(key))
            .cloned())
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut orders = self.orders.write().await;
        Ok(orders.iter_mut().find(|o| &o.id == id).map(|order| {
            order.status = status;
            order.clone()
        }))
    }

    async fn mark_paid(
        &self,
        id: &OrderId,
        key: &CheckoutSessionId,
        email: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut orders = self.orders.write().await;

        if orders
            .iter()
            .any(|o| &o.id != id && o.idempotency_key.as_ref() == Some(key))
        {
            return Err(RepositoryError::Conflict(format!(
                "idempotency key {key} already used"
            )));
        }

        Ok(orders.iter_mut().find(|o| &o.id == id).map(|order| {
            order.mark_paid(key.clone(), Utc::now());
            if order.customer_email.is_none() {
                order.customer_email = email.map(String::from);
            }
            order.clone()
        }))
    }
}
