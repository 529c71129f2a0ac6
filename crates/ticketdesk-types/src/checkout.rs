//! Checkout request types

use serde::{Deserialize, Serialize};

use crate::error::PricingError;

/// A ticket line in a checkout request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    /// Ticket type ID
    pub ticket_type_id: String,
    /// Units requested
    pub quantity: u32,
    /// Display name on the Stripe checkout page
    pub name: String,
    /// Unit price in minor currency units
    pub price: i64,
}

/// Checkout session request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Event occurrence
    pub event_id: String,
    /// Buyer name
    pub buyer_name: String,
    /// Buyer email
    pub buyer_email: String,
    /// Buyer phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Requested ticket lines
    pub items: Vec<CheckoutItem>,
    /// ISO currency code
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Event name shown on the checkout page
    #[serde(default)]
    pub event_name: Option<String>,
}

fn default_currency() -> String {
    "usd".to_string()
}

impl CheckoutRequest {
    /// Lines with a positive quantity
    pub fn billable_items(&self) -> impl Iterator<Item = &CheckoutItem> {
        self.items.iter().filter(|i| i.quantity > 0)
    }

    /// Sum of price × quantity over billable lines.
    ///
    /// Negative prices and totals that overflow are refused.
    pub fn total(&self) -> Result<i64, PricingError> {
        priced_total(
            self.billable_items()
                .map(|i| (i.ticket_type_id.as_str(), i.price, i.quantity)),
        )
    }

    /// Item list as stored in session metadata and pending orders
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.billable_items()
            .map(|i| OrderItem {
                ticket_type_id: i.ticket_type_id.clone(),
                quantity: i.quantity,
            })
            .collect()
    }
}

/// Ticket type and quantity, without pricing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Ticket type ID
    pub ticket_type_id: String,
    /// Units to issue
    #[serde(default = "default_item_quantity")]
    pub quantity: u32,
}

const fn default_item_quantity() -> u32 {
    1
}

/// A line of a free order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeOrderItem {
    /// Ticket type ID
    pub ticket_type_id: String,
    /// Units to issue
    #[serde(default = "default_item_quantity")]
    pub quantity: u32,
    /// Unit price; anything but zero is refused
    #[serde(default)]
    pub price: i64,
}

/// Order issued without payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeOrderRequest {
    /// Event occurrence
    pub event_id: String,
    /// Buyer name
    pub buyer_name: String,
    /// Buyer email
    pub buyer_email: String,
    /// Buyer phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Lines to issue
    #[serde(default)]
    pub items: Vec<FreeOrderItem>,
}

impl FreeOrderRequest {
    /// Lines with a positive quantity
    pub fn issuable_items(&self) -> impl Iterator<Item = &FreeOrderItem> {
        self.items.iter().filter(|i| i.quantity > 0)
    }

    /// Sum of price × quantity over issuable lines
    pub fn total(&self) -> Result<i64, PricingError> {
        priced_total(
            self.issuable_items()
                .map(|i| (i.ticket_type_id.as_str(), i.price, i.quantity)),
        )
    }
}

fn priced_total<'a>(
    mut lines: impl Iterator<Item = (&'a str, i64, u32)>,
) -> Result<i64, PricingError> {
    lines.try_fold(0i64, |total, (ticket_type_id, price, quantity)| {
        if price < 0 {
            return Err(PricingError::NegativePrice {
                ticket_type_id: ticket_type_id.to_string(),
            });
        }
        price
            .checked_mul(i64::from(quantity))
            .and_then(|line| total.checked_add(line))
            .ok_or(PricingError::Overflow)
    })
}

impl From<&CheckoutRequest> for FreeOrderRequest {
    fn from(req: &CheckoutRequest) -> Self {
        Self {
            event_id: req.event_id.clone(),
            buyer_name: req.buyer_name.clone(),
            buyer_email: req.buyer_email.clone(),
            phone: req.phone.clone(),
            items: req
                .billable_items()
                .map(|i| FreeOrderItem {
                    ticket_type_id: i.ticket_type_id.clone(),
                    quantity: i.quantity,
                    price: i.price,
                })
                .collect(),
        }
    }
}
