//! Atelier Core - Shared domain types.
//!
//! This crate provides the types shared by the Atelier components:
//! - `storefront` - HTTP server: orders, checkout, payment webhooks
//! - `cli` - Command-line tools for migrations and API access
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart totals, minor-unit conversion and the country
//! table live here so both binaries agree on them.
//!
//! # Modules
//!
//! - [`types`] - IDs, money, statuses, addresses, carts, checkout data, orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
