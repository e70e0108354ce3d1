//! Orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::address::Address;
use super::cart::CartItem;
use super::id::{CheckoutSessionId, OrderId, ProductId};
use super::money::{MoneyError, checked_sum, line_amount};
use super::status::{OrderStatus, PaymentStatus};

/// Keys the server owns. They are never taken from a creation body's
/// pass-through fields.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "order_number",
    "created_at",
    "updated_at",
    "idempotency_key",
];

/// A line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl From<CartItem> for OrderItem {
    fn from(item: CartItem) -> Self {
        Self {
            id: None,
            product_id: Some(item.product_id),
            name: item.name,
            price: item.price,
            quantity: item.quantity,
            image: item.image,
            size: item.size,
            color: item.color,
        }
    }
}

/// An order as stored by the storefront.
///
/// Fields the storefront does not model are kept in `extra` and echoed back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub item_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    /// Checkout session that finalized this order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<CheckoutSessionId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    /// The order with a placeholder line when it carries no items.
    ///
    /// Some upstream orders arrive without line items; clients still expect a
    /// non-empty list, so a single line priced at the order total stands in.
    #[must_use]
    pub fn with_placeholder_items(mut self) -> Self {
        if self.items.as_ref().is_none_or(Vec::is_empty) {
            self.items = Some(vec![OrderItem {
                id: Some(format!("{}-1", self.id)),
                product_id: None,
                name: format!("Order {}", self.order_number),
                price: self.total,
                quantity: 1,
                image: None,
                size: None,
                color: None,
            }]);
        }
        self
    }

    /// Mark the order paid by the given checkout session.
    ///
    /// A pending order moves to processing; later statuses are kept.
    pub fn mark_paid(&mut self, session: CheckoutSessionId, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Paid;
        if self.status == OrderStatus::Pending {
            self.status = OrderStatus::Processing;
        }
        self.idempotency_key = Some(session);
        self.updated_at = now;
    }
}

/// Body accepted when creating an order. Every field is optional and any
/// unknown field is carried through to the stored order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewOrder {
    #[serde(with = "rust_decimal::serde::float_option")]
    pub total: Option<Decimal>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub item_count: Option<u32>,
    pub items: Option<Vec<OrderItem>>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewOrder {
    /// Build the stored order under a server-assigned id and order number.
    ///
    /// Missing totals and counts are derived from the items; a missing
    /// customer name falls back to the shipping address.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the total has to be derived and the
    /// item amounts overflow.
    pub fn into_order(
        self,
        id: OrderId,
        order_number: String,
        now: DateTime<Utc>,
    ) -> Result<Order, MoneyError> {
        let items = self.items;
        let total = match self.total {
            Some(total) => total,
            None => checked_sum(
                items
                    .iter()
                    .flatten()
                    .map(|item| line_amount(item.price, item.quantity)),
            )?,
        };
        let item_count = self.item_count.unwrap_or_else(|| {
            items
                .iter()
                .flatten()
                .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
        });
        let customer_name = self
            .customer_name
            .or_else(|| self.shipping_address.as_ref().map(Address::full_name));

        let mut extra = self.extra;
        for key in RESERVED_KEYS {
            extra.remove(*key);
        }

        Ok(Order {
            id,
            order_number,
            total,
            status: self.status.unwrap_or_default(),
            payment_status: self.payment_status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            customer_name,
            customer_email: self.customer_email,
            item_count,
            items,
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            idempotency_key: None,
            extra,
        })
    }
}

/// Time-based human-readable order number, e.g. `ORD-1760000000000`.
#[must_use]
pub fn order_number_at(now: DateTime<Utc>) -> String {
    format!("ORD-{}", now.timestamp_millis())
}
