//! Pending orders: paid (or free) orders whose ticket issuance did not finish

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkout::OrderItem;

/// Pending order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    /// Waiting for an operator retry
    Pending,
}

/// One line of a pending order with its issuance progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItem {
    /// Ticket type ID
    pub ticket_type_id: String,
    /// Units ordered
    pub quantity: u32,
    /// Units already issued upstream
    #[serde(default)]
    pub issued: u32,
}

impl PendingItem {
    /// Units still to issue
    pub const fn remaining(&self) -> u32 {
        self.quantity.saturating_sub(self.issued)
    }
}

impl From<&OrderItem> for PendingItem {
    fn from(item: &OrderItem) -> Self {
        Self {
            ticket_type_id: item.ticket_type_id.clone(),
            quantity: item.quantity,
            issued: 0,
        }
    }
}

/// An order that could not be fully issued on the ticketing provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Local ID
    pub id: Uuid,
    /// Stripe checkout session, absent for free orders
    #[serde(default)]
    pub stripe_session_id: Option<String>,
    /// Event occurrence
    pub event_id: String,
    /// Buyer name
    pub buyer_name: String,
    /// Buyer email
    pub buyer_email: String,
    /// Buyer phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Lines with per-line issuance progress
    pub items: Vec<PendingItem>,
    /// Amount charged in minor currency units
    pub amount_total: i64,
    /// Status
    pub status: PendingStatus,
    /// Last issuance error
    pub error: String,
    /// When the order was queued
    pub created_at: DateTime<Utc>,
    /// When the order was last retried
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PendingOrder {
    /// Units still to issue across all lines
    pub fn remaining_units(&self) -> u32 {
        self.items.iter().map(PendingItem::remaining).sum()
    }

    /// Units ordered across all lines
    pub fn total_units(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}
