//! Payment pipeline errors

use thiserror::Error;
use uuid::Uuid;

use ticketdesk_provider::ProviderError;

/// Payment pipeline errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Request was refused, by us or by Stripe
    #[error("{0}")]
    Rejected(String),

    /// A required setting is missing
    #[error("{0}")]
    Configuration(&'static str),

    /// No pending order with this ID
    #[error("pending order not found: {0}")]
    PendingOrderNotFound(Uuid),

    /// Some but not all tickets were issued. The remainder is recorded as a
    /// pending order.
    #[error("issued {issued} of {requested} tickets: {message}")]
    PartialFulfillment {
        /// Pending order holding the remainder
        pending_id: Uuid,
        /// Units issued so far
        issued: u32,
        /// Units ordered
        requested: u32,
        /// Joined upstream errors
        message: String,
    },

    /// Could not reach Stripe, or Stripe failed
    #[error("payment provider unavailable: {0}")]
    Transport(String),

    /// Webhook signature or payload was invalid
    #[error("webhook error: {0}")]
    Webhook(String),

    /// Another retry of the same pending order is running
    #[error("retry already in progress for pending order {0}")]
    RetryInProgress(Uuid),

    /// Pending store could not be read or written
    #[error("pending order store error: {0}")]
    Store(String),

    /// Ticketing provider error
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl PaymentError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::PendingOrderNotFound(_) => true,
            Self::Provider(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Result type for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
