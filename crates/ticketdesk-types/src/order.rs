//! Logical orders reconstructed from issued tickets

use serde::{Deserialize, Serialize};

/// How an order was paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    /// Zero total, issued without payment
    Free,
    /// Paid through Stripe Checkout
    Stripe,
}

impl OrderSource {
    /// Classify an order by its total
    pub const fn from_total(total: i64) -> Self {
        if total == 0 {
            Self::Free
        } else {
            Self::Stripe
        }
    }

    /// Wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Stripe => "stripe",
        }
    }
}

impl std::fmt::Display for OrderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket as exposed inside a logical order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTicket {
    /// Issued ticket ID
    pub id: String,
    /// Barcode
    pub barcode: Option<String>,
    /// Ticket type ID
    pub ticket_type_id: Option<String>,
    /// Attendee name (never masked)
    pub full_name: String,
    /// Attendee email (never masked)
    pub email: String,
    /// Price in minor currency units
    pub listed_price: i64,
    /// Whether the ticket has been scanned
    pub checked_in: bool,
    /// Provider status
    pub status: Option<String>,
    /// Creation time (Unix timestamp)
    pub created_at: i64,
}

/// Order-shaped view over issued tickets sharing a buyer and an event.
///
/// Never stored; rebuilt on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalOrder {
    /// Composite ID built from the event and buyer key
    pub id: String,
    /// Buyer name (never masked)
    pub buyer_name: String,
    /// Buyer email (never masked)
    pub buyer_email: String,
    /// Event occurrence
    pub event_id: String,
    /// Display name of the event
    pub event_name: String,
    /// Sum of constituent ticket prices
    pub total: i64,
    /// `free` when the total is zero, otherwise `stripe`
    pub source: OrderSource,
    /// Earliest constituent ticket's creation time
    pub created_at: i64,
    /// Constituent tickets
    pub issued_tickets: Vec<OrderTicket>,
}
