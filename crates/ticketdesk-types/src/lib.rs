//! Ticketdesk Types - Shared domain types
//!
//! This crate contains domain types used across ticketdesk crates:
//! - Provider records (issued tickets, events, series, bundles, discounts)
//! - Derived views (logical orders, bundle availability)
//! - Checkout and pending-order types for the payment pipeline
//! - The `name|email` reference codec used to recover masked PII

pub mod catalog;
pub mod checkout;
pub mod error;
pub mod order;
pub mod pending;
pub mod reference;
pub mod ticket;

pub use catalog::*;
pub use checkout::*;
pub use error::*;
pub use order::*;
pub use pending::*;
pub use reference::*;
pub use ticket::*;
