//! Core types for the Atelier storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod cart;
pub mod checkout;
pub mod country;
pub mod email;
pub mod id;
pub mod money;
pub mod order;
pub mod status;

pub use address::{Address, AddressInput, AddressValidation};
pub use cart::{Cart, CartItem};
pub use checkout::CheckoutData;
pub use country::{CountryCode, UnknownCountry};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{
    CurrencyCode, MoneyError, checked_sum, from_minor_units, line_amount, to_minor_units,
};
pub use order::{NewOrder, Order, OrderItem, order_number_at};
pub use status::*;
