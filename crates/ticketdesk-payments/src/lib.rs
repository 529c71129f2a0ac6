//! Ticketdesk Payments - Payment reconciliation pipeline
//!
//! This crate turns payments into issued tickets:
//! - Stripe Checkout Sessions with a destination-charge platform fee
//! - Free orders issued directly on the ticketing provider
//! - Webhook verification and webhook-driven ticket issuance
//! - A pending-order store for orders that could not be fully issued
//! - Booking confirmations over SMTP
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ticketdesk_payments::{FulfillmentService, JsonFileStore, LogNotifier, PaymentsConfig};
//!
//! let config = PaymentsConfig::new("http://localhost:5173")
//!     .with_secret_key("sk_test_...")
//!     .with_connected_account("acct_...");
//! let service = FulfillmentService::new(
//!     config,
//!     provider_client,
//!     Arc::new(JsonFileStore::new("data/pending_orders.json")),
//!     Arc::new(LogNotifier),
//! );
//! ```

pub mod config;
pub mod error;
pub mod issuer;
pub mod metrics;
pub mod notifier;
pub mod pending;
pub mod provider;
pub mod service;
pub mod stripe;
pub mod webhook;

pub use config::{application_fee, PaymentsConfig};
pub use error::{PaymentError, PaymentResult};
pub use issuer::{EventDescriptor, IssuanceReport, TicketIssuer};
pub use notifier::{ConfirmedTicket, LogNotifier, Notifier, SmtpNotifier, SmtpSettings, TicketConfirmation};
pub use pending::{JsonFileStore, MemoryStore, PendingOrderStore};
pub use provider::{CheckoutSession, PaymentProvider, SessionLine, SessionRequest};
pub use service::{
    CheckoutOutcome, FreeCheckout, FreeOrderResult, FulfillmentService, PaidCheckout,
    PendingOrderList, RetryResult, WebhookOutcome,
};
pub use stripe::StripeProvider;
pub use webhook::{WebhookEvent, WebhookEventType, WebhookHandler};
