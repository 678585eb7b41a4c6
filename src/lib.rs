//! Checkout
//!
//! Point-of-sale checkout and payment reconciliation: cart assembly, stock validation, split
//! payments across methods, and order confirmation against an external system of record.

pub mod cart;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod context;
pub mod customers;
pub mod errors;
pub mod fixtures;
pub mod ids;
pub mod invoice;
pub mod order;
pub mod payments;
pub mod prelude;
pub mod pricing;
pub mod providers;
pub mod session;
pub mod stock;
pub mod totals;
