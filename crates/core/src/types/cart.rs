//! Shopping cart.
//!
//! The cart is an ordered list of line items. Its total and item count are
//! cached and recomputed after every mutation, so readers never see a stale
//! total.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::money::{MoneyError, line_amount};

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Unit price in major currency units.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CartItem {
    /// `price * quantity`.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Result<Decimal, MoneyError> {
        line_amount(self.price, self.quantity)
    }

    /// Two lines are the same variant when product, size and color match.
    fn same_variant(&self, other: &Self) -> bool {
        self.product_id == other.product_id && self.size == other.size && self.color == other.color
    }
}

/// The shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CartItems", into = "CartItems")]
pub struct Cart {
    items: Vec<CartItem>,
    total: Decimal,
    item_count: u32,
}

/// Wire form of a cart: the items only. Totals are derived on load.
#[derive(Serialize, Deserialize)]
struct CartItems {
    items: Vec<CartItem>,
}

impl From<CartItems> for Cart {
    fn from(wire: CartItems) -> Self {
        Self::from_items(wire.items)
    }
}

impl From<Cart> for CartItems {
    fn from(cart: Cart) -> Self {
        Self { items: cart.items }
    }
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from existing items (zero-quantity items are dropped).
    #[must_use]
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let mut cart = Self {
            items,
            ..Self::default()
        };
        cart.items.retain(|item| item.quantity > 0);
        cart.recompute();
        cart
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Sum of `price * quantity` over all lines, saturating at `Decimal::MAX`.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub const fn item_count(&self) -> u32 {
        self.item_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add an item. Merges into an existing line for the same variant.
    pub fn add(&mut self, item: CartItem) {
        if item.quantity == 0 {
            return;
        }
        match self.items.iter_mut().find(|line| line.same_variant(&item)) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }
        self.recompute();
    }

    /// Set the quantity of the line at `index`. Zero removes the line.
    ///
    /// Returns `false` if there is no such line.
    pub fn update_quantity(&mut self, index: usize, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(index).is_some();
        }
        let Some(line) = self.items.get_mut(index) else {
            return false;
        };
        line.quantity = quantity;
        self.recompute();
        true
    }

    /// Remove and return the line at `index`.
    pub fn remove(&mut self, index: usize) -> Option<CartItem> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.recompute();
        Some(removed)
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
        self.recompute();
    }

    /// Consume the cart, returning its items.
    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    fn recompute(&mut self) {
        self.total = self.items.iter().fold(Decimal::ZERO, |acc, item| {
            acc.saturating_add(item.price.saturating_mul(Decimal::from(item.quantity)))
        });
        self.item_count = self
            .items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn item(id: &str, price: &str, quantity: u32, size: Option<&str>) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            image: None,
            price: Decimal::from_str(price).unwrap(),
            quantity,
            size: size.map(String::from),
            color: None,
        }
    }

    #[test]
    fn test_add_merges_same_variant() {
        let mut cart = Cart::new();
        cart.add(item("dress", "80.00", 1, Some("M")));
        cart.add(item("dress", "80.00", 2, Some("M")));
        cart.add(item("dress", "80.00", 1, Some("S")));

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.item_count(), 4);
        assert_eq!(cart.total(), Decimal::from_str("320.00").unwrap());
    }

    #[test]
    fn test_update_quantity_recomputes_total() {
        let mut cart = Cart::new();
        cart.add(item("scarf", "25.50", 1, None));
        cart.add(item("belt", "40.00", 1, None));

        assert!(cart.update_quantity(0, 3));
        assert_eq!(cart.total(), Decimal::from_str("116.50").unwrap());
        assert!(!cart.update_quantity(7, 1));
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let mut cart = Cart::new();
        cart.add(item("scarf", "25.50", 2, None));
        assert!(cart.update_quantity(0, 0));
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add(item("a", "1.00", 1, None));
        cart.add(item("b", "2.00", 1, None));

        let removed = cart.remove(0).unwrap();
        assert_eq!(removed.product_id.as_str(), "a");
        assert_eq!(cart.total(), Decimal::from_str("2.00").unwrap());
        assert!(cart.remove(5).is_none());

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
    }

    #[test]
    fn test_huge_prices_saturate_instead_of_panicking() {
        let mut cart = Cart::new();
        let mut line = item("yacht", "1", 3, None);
        line.price = Decimal::MAX;
        cart.add(line);

        assert_eq!(cart.total(), Decimal::MAX);
        assert_eq!(cart.items()[0].line_total(), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_deserialize_derives_totals() {
        let json = r#"{"items": [
            {"product_id": "p1", "name": "Tee", "price": 19.99, "quantity": 2},
            {"product_id": "p2", "name": "Cap", "price": 15, "quantity": 0}
        ]}"#;
        let cart: Cart = serde_json::from_str(json).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.total(), Decimal::from_str("39.98").unwrap());
        assert_eq!(cart.item_count(), 2);
    }
}
