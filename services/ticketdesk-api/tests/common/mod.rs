//! Shared fixtures for API route tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use ticketdesk_api::{build_router, AppState, Config};
use ticketdesk_payments::{
    CheckoutSession, FulfillmentService, LogNotifier, MemoryStore, PaymentProvider,
    PaymentResult, SessionRequest,
};
use ticketdesk_provider::InMemoryProvider;

pub const WEBHOOK_SECRET: &str = "whsec_routes";

/// Payment provider that hands out numbered sessions
#[derive(Default)]
pub struct FakeStripe {
    next: AtomicUsize,
}

#[async_trait]
impl PaymentProvider for FakeStripe {
    async fn create_checkout_session(
        &self,
        _request: &SessionRequest,
    ) -> PaymentResult<CheckoutSession> {
        let id = format!("cs_test_{}", self.next.fetch_add(1, Ordering::SeqCst));
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/{id}")),
            id,
        })
    }
}

pub struct TestApp {
    pub provider: Arc<InMemoryProvider>,
    pub router: Router,
}

impl TestApp {
    /// Send a request and decode the JSON body (`Null` when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, body).await
    }
}

/// Config from a fixed environment on top of a provider API key
pub fn config(vars: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = HashMap::from([(
        "TICKET_TAILOR_API_KEY".to_string(),
        "tt_key".to_string(),
    )]);
    for (k, v) in vars {
        env.insert((*k).to_string(), (*v).to_string());
    }
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub fn stripe_config() -> Config {
    config(&[
        ("STRIPE_SECRET_KEY", "sk_test"),
        ("STRIPE_CONNECTED_ACCOUNT", "acct_merchant"),
    ])
}

pub fn app_with(config: Config) -> TestApp {
    let provider = Arc::new(InMemoryProvider::new());
    provider.set_response(
        "/events/ev_1",
        json!({ "id": "ev_1", "name": "Friday", "event_series_id": "es_1", "venue": { "name": "Blue Room" } }),
    );

    let payments = FulfillmentService::new(
        config.payments.clone(),
        provider.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(LogNotifier),
    )
    .with_payment_provider(Arc::new(FakeStripe::default()));

    let state = AppState::new(provider.clone(), payments, config);
    TestApp {
        provider,
        router: build_router(state, None),
    }
}

pub fn app() -> TestApp {
    app_with(stripe_config())
}

/// A `checkout.session.completed` body
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
                "items": items,
                "event_name": "Friday"
            }
        }}
    }))
    .unwrap()
}
