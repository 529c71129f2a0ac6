//! Ticketdesk Provider - Ticketing provider integration
//!
//! The ticketing provider is the system of record for events, tickets and
//! orders. This crate wraps its REST API and derives the views the provider
//! cannot give directly: buyer-level orders rebuilt from issued tickets with
//! masked PII recovered, bundle availability from multi-ticket inventory, and
//! discount updates emulated by replacement.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ticketdesk_provider::{OrderAggregator, ProviderClient, ProviderConfig};
//!
//! let config = ProviderConfig::new("api_key").with_page_size(100);
//! let client = Arc::new(ProviderClient::new(config)?);
//!
//! let orders = OrderAggregator::new(client.clone(), 100).list_orders().await?;
//! ```

pub mod bundles;
pub mod catalog;
pub mod check_ins;
pub mod client;
pub mod config;
pub mod discounts;
pub mod error;
pub mod orders;
pub mod pii;

#[cfg(feature = "test-utils")]
pub mod mock;

pub use bundles::BundleCalculator;
pub use catalog::{BundleDraft, Catalog, EventDraft, EventTickets, SeriesDraft, TicketGroupDraft, TicketTypeDraft};
pub use check_ins::CheckInService;
pub use client::{decode, form, Form, ProviderClient, TicketingApi};
pub use config::ProviderConfig;
pub use discounts::DiscountService;
pub use error::{ProviderError, ProviderResult};
pub use orders::OrderAggregator;
pub use pii::{Identity, IdentityResolver, LocalIdentity};

#[cfg(feature = "test-utils")]
pub use mock::InMemoryProvider;
