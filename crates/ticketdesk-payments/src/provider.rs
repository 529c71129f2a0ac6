//! Payment provider abstraction

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PaymentResult;

/// One priced line on the hosted checkout page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLine {
    /// Product name
    pub name: String,
    /// Product description
    pub description: String,
    /// Unit price in minor units
    pub unit_amount: i64,
    /// Units
    pub quantity: u32,
}

/// Checkout session to create, with the revenue split already computed
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Lower-case ISO currency
    pub currency: String,
    /// Priced lines
    pub lines: Vec<SessionLine>,
    /// Prefills the checkout email field
    pub customer_email: String,
    /// Redirect after payment
    pub success_url: String,
    /// Redirect on cancel
    pub cancel_url: String,
    /// Order details echoed back on the completion webhook
    pub metadata: BTreeMap<String, String>,
    /// Platform share in minor units
    pub application_fee_amount: i64,
    /// Connected account receiving the rest
    pub destination: String,
}

/// Created checkout session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session ID
    pub id: String,
    /// Hosted checkout URL
    pub url: Option<String>,
}

/// Payment provider trait
///
/// Abstracts payment processing so the fulfillment pipeline can be tested
/// without Stripe.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session
    async fn create_checkout_session(&self, request: &SessionRequest)
        -> PaymentResult<CheckoutSession>;
}
