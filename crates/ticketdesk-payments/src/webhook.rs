//! Stripe webhook handling

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{PaymentError, PaymentResult};

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Webhook event types we handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    /// Checkout session completed
    CheckoutSessionCompleted,
    /// Anything else; acknowledged and ignored
    Unknown(String),
}

impl From<&str> for WebhookEventType {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl WebhookEventType {
    /// Metric label
    pub fn as_label(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::Unknown(other) => other,
        }
    }
}

/// Parsed webhook event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Event ID
    pub id: String,
    /// Event type
    pub event_type: WebhookEventType,
    /// Event data
    pub data: WebhookEventData,
}

/// Webhook event data
#[derive(Debug, Clone)]
pub enum WebhookEventData {
    /// Completed checkout session
    CheckoutSession(CompletedSession),
    /// Raw JSON for unhandled events
    Raw(serde_json::Value),
}

/// A paid checkout session and the order details stored on it
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedSession {
    /// Session ID
    #[serde(default)]
    pub id: String,
    /// Amount charged in minor units
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Order details set when the session was created
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CompletedSession {
    /// Metadata value, if present and non-empty
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Webhook handler for verifying and parsing Stripe events
#[derive(Clone)]
pub struct WebhookHandler {
    webhook_secret: Option<String>,
}

impl WebhookHandler {
    /// Create a new webhook handler. Without a secret, signatures are not
    /// checked.
    pub fn new(webhook_secret: Option<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
        }
    }

    /// Whether signatures are verified
    pub fn verifies_signatures(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Verify and parse a webhook payload
    #[instrument(skip(self, payload, signature))]
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> PaymentResult<WebhookEvent> {
        match &self.webhook_secret {
            Some(secret) => {
                let signature = signature.ok_or_else(|| {
                    warn!("Webhook received without Stripe-Signature header");
                    PaymentError::Webhook("Missing Stripe-Signature header".to_string())
                })?;
                verify_signature(secret, payload, signature, Utc::now().timestamp())?;
            }
            None => {
                warn!("STRIPE_WEBHOOK_SECRET not set; accepting webhook without verification");
            }
        }

        let raw_event: RawStripeEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::Webhook(format!("Invalid webhook payload: {e}")))?;

        debug!(event_id = %raw_event.id, event_type = %raw_event.event_type, "Parsed webhook event");

        let event_type = WebhookEventType::from(raw_event.event_type.as_str());
        let data = Self::parse_event_data(&event_type, raw_event.data.object)?;

        Ok(WebhookEvent {
            id: raw_event.id,
            event_type,
            data,
        })
    }

    /// Parse event data based on type
    fn parse_event_data(
        event_type: &WebhookEventType,
        object: serde_json::Value,
    ) -> PaymentResult<WebhookEventData> {
        match event_type {
            WebhookEventType::CheckoutSessionCompleted => {
                let session: CompletedSession = serde_json::from_value(object)
                    .map_err(|e| PaymentError::Webhook(e.to_string()))?;
                Ok(WebhookEventData::CheckoutSession(session))
            }
            WebhookEventType::Unknown(kind) => {
                info!(event_type = %kind, "Ignoring webhook event type");
                Ok(WebhookEventData::Raw(object))
            }
        }
    }
}

impl std::fmt::Debug for WebhookHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookHandler")
            .field("verifies_signatures", &self.verifies_signatures())
            .finish()
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, as Stripe signs it
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> PaymentResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Webhook("Invalid webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a `Stripe-Signature` header (`t=<ts>,v1=<sig>[,v1=<sig>]`) at `now`
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
) -> PaymentResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        if let Some((key, value)) = part.trim().split_once('=') {
            match key {
                "t" => timestamp = Some(value),
                "v1" => candidates.push(value),
                _ => {}
            }
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        warn!("Missing timestamp in webhook signature");
        PaymentError::Webhook("Missing timestamp".to_string())
    })?;

    if candidates.is_empty() {
        warn!("Missing v1 signature in webhook signature");
        return Err(PaymentError::Webhook("Missing signature".to_string()));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::Webhook("Invalid timestamp format".to_string()))?;

    let expected = compute_signature(secret, ts, payload)?;

    if !candidates
        .iter()
        .any(|sig| constant_time_eq(sig.as_bytes(), expected.as_bytes()))
    {
        error!("Webhook signature verification failed");
        return Err(PaymentError::Webhook(
            "Signature verification failed".to_string(),
        ));
    }

    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        warn!(timestamp = ts, now = now, "Webhook timestamp outside tolerance");
        return Err(PaymentError::Webhook("Timestamp too old".to_string()));
    }

    Ok(())
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Raw Stripe event for parsing
#[derive(Debug, Deserialize)]
struct RawStripeEvent {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}
