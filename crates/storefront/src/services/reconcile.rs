//! Turn completed checkout sessions into finalized orders, exactly once.
//!
//! The processor may deliver the same webhook more than once, and may deliver
//! it before or after the shopper's browser returns. The checkout session id
//! is stored on the order as its idempotency key and looked up before any
//! write, so replays are no-ops.

use std::sync::Arc;

use atelier_core::{
    CheckoutSessionId, Order, OrderId, OrderStatus, PaymentStatus, from_minor_units,
    order_number_at,
};
use chrono::Utc;
use serde_json::Map;
use tracing::instrument;

use crate::db::{OrderRepository, RepositoryError};
use crate::payments::CompletedCheckoutSession;

/// What reconciling a session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// An order already carries this session id; nothing was written.
    AlreadyProcessed(OrderId),
    /// An existing order was marked paid.
    Finalized(OrderId),
    /// No matching order existed; one was created from the session.
    Created(OrderId),
}

impl ReconcileOutcome {
    #[must_use]
    pub const fn order_id(&self) -> &OrderId {
        match self {
            Self::AlreadyProcessed(id) | Self::Finalized(id) | Self::Created(id) => id,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyProcessed(_) => "already_processed",
            Self::Finalized(_) => "finalized",
            Self::Created(_) => "created",
        }
    }
}

/// Applies completed checkout sessions to the order repository.
#[derive(Clone)]
pub struct OrderReconciler {
    orders: Arc<dyn OrderRepository>,
}

impl OrderReconciler {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    /// Finalize the order for a completed session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the repository fails. The caller should
    /// let the processor retry; retries are safe.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn reconcile(
        &self,
        session: &CompletedCheckoutSession,
    ) -> Result<ReconcileOutcome, RepositoryError> {
        if let Some(existing) = self.orders.find_by_idempotency_key(&session.id).await? {
            tracing::info!(order_id = %existing.id, "Checkout session already reconciled");
            return Ok(ReconcileOutcome::AlreadyProcessed(existing.id));
        }

        if let Some(order_id) = session.order_id() {
            match self
                .orders
                .mark_paid(&order_id, &session.id, session.email())
                .await
            {
                Ok(Some(order)) => {
                    tracing::info!(order_id = %order.id, "Order marked paid");
                    return Ok(ReconcileOutcome::Finalized(order.id));
                }
                Ok(None) => {}
                Err(RepositoryError::Conflict(reason)) => {
                    return self.concurrent_winner(&session.id, reason).await;
                }
                Err(e) => return Err(e),
            }
        }

        let order = order_from_session(session, Utc::now());
        match self.orders.save(&order).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(reason)) => {
                return self.concurrent_winner(&session.id, reason).await;
            }
            Err(e) => return Err(e),
        }
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            "Order created from checkout session"
        );
        Ok(ReconcileOutcome::Created(order.id))
    }

    /// Resolve a key conflict raised by a write. If a concurrent delivery of
    /// the same session got there first, its order is the result.
    async fn concurrent_winner(
        &self,
        key: &CheckoutSessionId,
        reason: String,
    ) -> Result<ReconcileOutcome, RepositoryError> {
        match self.orders.find_by_idempotency_key(key).await? {
            Some(winner) => {
                tracing::info!(
                    order_id = %winner.id,
                    "Concurrent delivery already reconciled this session"
                );
                Ok(ReconcileOutcome::AlreadyProcessed(winner.id))
            }
            None => Err(RepositoryError::Conflict(reason)),
        }
    }
}

/// A paid order built from the session alone, for payments whose order is
/// unknown to this store.
fn order_from_session(session: &CompletedCheckoutSession, now: chrono::DateTime<Utc>) -> Order {
    let mut extra = Map::new();
    if let Some(currency) = &session.currency {
        extra.insert("currency".to_string(), currency.clone().into());
    }
    if let Some(reference) = &session.client_reference_id {
        extra.insert("client_reference_id".to_string(), reference.clone().into());
    }

    Order {
        id: session.order_id().unwrap_or_else(OrderId::generate),
        order_number: order_number_at(now),
        total: from_minor_units(session.amount_total.unwrap_or(0)),
        status: OrderStatus::Processing,
        payment_status: PaymentStatus::Paid,
        created_at: now,
        updated_at: now,
        customer_name: None,
        customer_email: session.email().map(String::from),
        item_count: 0,
        items: None,
        shipping_address: None,
        billing_address: None,
        idempotency_key: Some(session.id.clone()),
        extra,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::db::InMemoryOrderRepository;

    fn session(value: serde_json::Value) -> CompletedCheckoutSession {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_creates_order_from_unknown_session() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let reconciler = OrderReconciler::new(repo.clone());

        let outcome = reconciler
            .reconcile(&session(json!({
                "id": "cs_test_1",
                "amount_total": 12_950,
                "currency": "usd",
                "customer_details": {"email": "ada@example.com"}
            })))
            .await
            .unwrap();

        let ReconcileOutcome::Created(id) = outcome else {
            panic!("expected a created order, got {outcome:?}");
        };
        let order = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(order.total, Decimal::from_str("129.50").unwrap());
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.customer_email.as_deref(), Some("ada@example.com"));
        assert_eq!(order.idempotency_key.unwrap().as_str(), "cs_test_1");
        assert!(order.order_number.starts_with("ORD-"));
    }

    #[tokio::test]
    async fn test_replay_creates_exactly_one_order() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let reconciler = OrderReconciler::new(repo.clone());
        let completed = session(json!({"id": "cs_test_2", "amount_total": 5_000}));

        let first = reconciler.reconcile(&completed).await.unwrap();
        let second = reconciler.reconcile(&completed).await.unwrap();

        assert!(matches!(first, ReconcileOutcome::Created(_)));
        assert_eq!(second, ReconcileOutcome::AlreadyProcessed(first.order_id().clone()));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finalizes_existing_order() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let now = Utc::now();
        let pending = atelier_core::NewOrder::default().into_order(
            OrderId::new("order-42"),
            "ORD-42".to_string(),
            now,
        )
        .unwrap();
        repo.save(&pending).await.unwrap();

        let reconciler = OrderReconciler::new(repo.clone());
        let outcome = reconciler
            .reconcile(&session(json!({
                "id": "cs_test_3",
                "client_reference_id": "order-42",
                "metadata": {"order_id": "order-42"},
                "customer_email": "grace@example.com"
            })))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Finalized(OrderId::new("order-42")));
        let order = repo.find_by_id(&OrderId::new("order-42")).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.customer_email.as_deref(), Some("grace@example.com"));
        assert_eq!(order.order_number, "ORD-42");
        assert_eq!(repo.list().await.unwrap().len(), 1);

        let replay = reconciler
            .reconcile(&session(json!({"id": "cs_test_3", "client_reference_id": "order-42"})))
            .await
            .unwrap();
        assert_eq!(replay.as_str(), "already_processed");
    }

    /// Repository whose writes always fail.
    struct BrokenRepository;

    #[async_trait]
    impl OrderRepository for BrokenRepository {
        async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
            Ok(Vec::new())
        }
        async fn find_by_id(&self, _id: &OrderId) -> Result<Option<Order>, RepositoryError> {
            Ok(None)
        }
        async fn save(&self, _order: &Order) -> Result<(), RepositoryError> {
            Err(RepositoryError::DataCorruption("disk on fire".to_string()))
        }
        async fn find_by_idempotency_key(
            &self,
            _key: &CheckoutSessionId,
        ) -> Result<Option<Order>, RepositoryError> {
            Ok(None)
        }
        async fn update_status(
            &self,
            _id: &OrderId,
            _status: OrderStatus,
        ) -> Result<Option<Order>, RepositoryError> {
            Ok(None)
        }
        async fn mark_paid(
            &self,
            _id: &OrderId,
            _key: &CheckoutSessionId,
            _email: Option<&str>,
        ) -> Result<Option<Order>, RepositoryError> {
            Ok(None)
        }
    }

    /// In-memory store that lets another writer act between the
    /// reconciler's reads and its write.
    struct InterleavedRepository {
        inner: InMemoryOrderRepository,
        /// Ship this order after every read.
        ship_on_read: Option<OrderId>,
        /// Answer the first key lookup as if the key were unused.
        stale_first_key_lookup: AtomicBool,
    }

    impl InterleavedRepository {
        fn new(inner: InMemoryOrderRepository) -> Self {
            Self {
                inner,
                ship_on_read: None,
                stale_first_key_lookup: AtomicBool::new(false),
            }
        }

        async fn after_read(&self) {
            if let Some(id) = &self.ship_on_read {
                self.inner
                    .update_status(id, OrderStatus::Shipped)
                    .await
                    .unwrap();
            }
        }
    }

    #[async_trait]
    impl OrderRepository for InterleavedRepository {
        async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
            self.inner.list().await
        }
        async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
            let found = self.inner.find_by_id(id).await;
            self.after_read().await;
            found
        }
        async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
            self.inner.save(order).await
        }
        async fn find_by_idempotency_key(
            &self,
            key: &CheckoutSessionId,
        ) -> Result<Option<Order>, RepositoryError> {
            if self.stale_first_key_lookup.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            let found = self.inner.find_by_idempotency_key(key).await;
            self.after_read().await;
            found
        }
        async fn update_status(
            &self,
            id: &OrderId,
            status: OrderStatus,
        ) -> Result<Option<Order>, RepositoryError> {
            self.inner.update_status(id, status).await
        }
        async fn mark_paid(
            &self,
            id: &OrderId,
            key: &CheckoutSessionId,
            email: Option<&str>,
        ) -> Result<Option<Order>, RepositoryError> {
            self.inner.mark_paid(id, key, email).await
        }
    }

    #[tokio::test]
    async fn test_finalize_keeps_status_changed_mid_reconcile() {
        let store = InMemoryOrderRepository::new();
        let pending = atelier_core::NewOrder::default()
            .into_order(OrderId::new("order-7"), "ORD-7".to_string(), Utc::now())
            .unwrap();
        store.save(&pending).await.unwrap();

        let repo = Arc::new(InterleavedRepository {
            ship_on_read: Some(OrderId::new("order-7")),
            ..InterleavedRepository::new(store)
        });
        let outcome = OrderReconciler::new(repo.clone())
            .reconcile(&session(json!({
                "id": "cs_test_7",
                "metadata": {"order_id": "order-7"}
            })))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Finalized(OrderId::new("order-7")));
        let order = repo.find_by_id(&OrderId::new("order-7")).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.idempotency_key.unwrap().as_str(), "cs_test_7");
    }

    #[tokio::test]
    async fn test_lost_create_race_reports_winner() {
        let store = InMemoryOrderRepository::new();
        let mut winner = atelier_core::NewOrder::default()
            .into_order(OrderId::new("winner"), "ORD-1".to_string(), Utc::now())
            .unwrap();
        winner.idempotency_key = Some(CheckoutSessionId::new("cs_test_8"));
        store.save(&winner).await.unwrap();

        let repo = Arc::new(InterleavedRepository {
            stale_first_key_lookup: AtomicBool::new(true),
            ..InterleavedRepository::new(store)
        });
        let outcome = OrderReconciler::new(repo.clone())
            .reconcile(&session(json!({"id": "cs_test_8", "amount_total": 100})))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyProcessed(OrderId::new("winner")));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lost_finalize_race_reports_winner() {
        let store = InMemoryOrderRepository::new();
        let mut winner = atelier_core::NewOrder::default()
            .into_order(OrderId::new("winner"), "ORD-1".to_string(), Utc::now())
            .unwrap();
        winner.idempotency_key = Some(CheckoutSessionId::new("cs_test_9"));
        store.save(&winner).await.unwrap();
        let other = atelier_core::NewOrder::default()
            .into_order(OrderId::new("other"), "ORD-2".to_string(), Utc::now())
            .unwrap();
        store.save(&other).await.unwrap();

        let repo = Arc::new(InterleavedRepository {
            stale_first_key_lookup: AtomicBool::new(true),
            ..InterleavedRepository::new(store)
        });
        let outcome = OrderReconciler::new(repo.clone())
            .reconcile(&session(json!({
                "id": "cs_test_9",
                "client_reference_id": "other"
            })))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyProcessed(OrderId::new("winner")));
        let other = repo.find_by_id(&OrderId::new("other")).await.unwrap().unwrap();
        assert_eq!(other.payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_repository_failure_propagates() {
        let reconciler = OrderReconciler::new(Arc::new(BrokenRepository));
        let err = reconciler
            .reconcile(&session(json!({"id": "cs_test_4"})))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }
}
