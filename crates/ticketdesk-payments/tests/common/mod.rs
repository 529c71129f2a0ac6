//! Shared fixtures for payment pipeline tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;

use ticketdesk_payments::webhook::compute_signature;
use ticketdesk_payments::{
    CheckoutSession, FulfillmentService, MemoryStore, Notifier, PaymentError, PaymentProvider,
    PaymentResult, PaymentsConfig, SessionRequest, TicketConfirmation,
};
use ticketdesk_provider::InMemoryProvider;
use ticketdesk_types::{CheckoutItem, CheckoutRequest};

pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Records every confirmation it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: DashMap<usize, TicketConfirmation>,
    next: AtomicUsize,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<TicketConfirmation> {
        let mut all: Vec<(usize, TicketConfirmation)> = self
            .sent
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        all.sort_by_key(|(k, _)| *k);
        all.into_iter().map(|(_, c)| c).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_ticket_confirmation(&self, confirmation: &TicketConfirmation) -> bool {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        self.sent.insert(n, confirmation.clone());
        true
    }
}

/// Payment provider that records session requests
#[derive(Default)]
pub struct MockPayments {
    pub requests: DashMap<String, SessionRequest>,
    next: AtomicUsize,
    pub reject_with: Option<String>,
}

#[async_trait]
impl PaymentProvider for MockPayments {
    async fn create_checkout_session(
        &self,
        request: &SessionRequest,
    ) -> PaymentResult<CheckoutSession> {
        if let Some(message) = &self.reject_with {
            return Err(PaymentError::Rejected(message.clone()));
        }
        let id = format!("cs_test_{}", self.next.fetch_add(1, Ordering::SeqCst));
        self.requests.insert(id.clone(), request.clone());
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/{id}")),
            id,
        })
    }
}

/// Everything a pipeline test pokes at
pub struct Harness {
    pub provider: Arc<InMemoryProvider>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub payments: Arc<MockPayments>,
    pub service: FulfillmentService,
}

pub fn config() -> PaymentsConfig {
    PaymentsConfig::new("http://localhost:5173")
        .with_secret_key("sk_test")
        .with_connected_account("acct_merchant")
}

pub fn harness_with(config: PaymentsConfig) -> Harness {
    let provider = Arc::new(InMemoryProvider::new());
    provider.set_response(
        "/events/ev_1",
        json!({ "id": "ev_1", "name": "Jazz Nights", "start": { "formatted": "Fri 3 Oct 8pm" }, "venue": { "name": "Blue Room" } }),
    );
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let payments = Arc::new(MockPayments::default());

    let service = FulfillmentService::new(config, provider.clone(), store.clone(), notifier.clone())
        .with_payment_provider(payments.clone());

    Harness {
        provider,
        store,
        notifier,
        payments,
        service,
    }
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn item(ticket_type_id: &str, price: i64, quantity: u32) -> CheckoutItem {
    CheckoutItem {
        ticket_type_id: ticket_type_id.to_string(),
        quantity,
        name: format!("{ticket_type_id} admission"),
        price,
    }
}

pub fn checkout(items: Vec<CheckoutItem>) -> CheckoutRequest {
    CheckoutRequest {
        event_id: "ev_1".to_string(),
        buyer_name: "Jane Doe".to_string(),
        buyer_email: "jane@x.com".to_string(),
        phone: None,
        items,
        currency: "USD".to_string(),
        event_name: Some("Jazz Nights".to_string()),
    }
}

/// A `checkout.session.completed` body for `items` (JSON list)
pub fn completed_event(session_id: &str, items: &str, amount_total: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{session_id}"),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "amount_total": amount_total,
            "metadata": {
                "event_id": "ev_1",
                "buyer_name": "Jane Doe",
                "buyer_email": "jane@x.com",
                "phone": "",
                "items": items,
                "connected_account": "acct_merchant",
                "event_name": "Jazz Nights"
            }
        }}
    }))
    .unwrap()
}

/// A current `Stripe-Signature` header for `body`
pub fn sign(body: &[u8]) -> String {
    let ts = Utc::now().timestamp();
    format!("t={ts},v1={}", compute_signature(WEBHOOK_SECRET, ts, body).unwrap())
}
