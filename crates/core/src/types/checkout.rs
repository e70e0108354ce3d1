//! Checkout payload.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::address::Address;
use super::cart::CartItem;
use super::email::Email;
use super::id::OrderId;
use super::money::{MoneyError, checked_sum};

/// Everything the shopper submitted for one checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutData {
    pub shipping_address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    /// Payment method tag chosen in the UI (e.g. `card`).
    pub payment_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub items: Vec<CartItem>,
    /// Order created before the payment session, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<Email>,
}

impl CheckoutData {
    /// Sum of line totals.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if a line or the sum overflows.
    pub fn subtotal(&self) -> Result<Decimal, MoneyError> {
        checked_sum(self.items.iter().map(CartItem::line_total))
    }

    /// The address to bill: the billing address if given, else shipping.
    #[must_use]
    pub fn billing_or_shipping(&self) -> &Address {
        self.billing_address
            .as_ref()
            .unwrap_or(&self.shipping_address)
    }
}
