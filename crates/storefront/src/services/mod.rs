//! Business logic services for storefront.
//!
//! # Services
//!
//! - `checkout` - Address validation, order creation, payment sessions
//! - `reconcile` - Apply completed payments to orders, idempotently

pub mod checkout;
pub mod reconcile;

pub use checkout::{
    AcceptAllValidator, AddressValidator, BegunCheckout, CheckoutError, CheckoutService,
    CheckoutSettings, CountryPolicy, CreatedOrder,
};
pub use reconcile::{OrderReconciler, ReconcileOutcome};
