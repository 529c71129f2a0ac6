//! Shared fixtures for provider integration tests

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use ticketdesk_provider::InMemoryProvider;
use ticketdesk_types::IssuedTicket;

/// Build an issued ticket with the fields aggregation looks at
pub fn ticket(id: &str, event_id: &str, email: &str, price: i64, created_at: i64) -> IssuedTicket {
    IssuedTicket {
        id: id.to_string(),
        barcode: Some(format!("BC-{id}")),
        event_id: event_id.to_string(),
        ticket_type_id: Some("tt_ga".to_string()),
        full_name: Some("Holder".to_string()),
        email: Some(email.to_string()),
        listed_price: price,
        created_at,
        status: Some("valid".to_string()),
        ..Default::default()
    }
}

/// A ticket whose PII the provider has masked
pub fn masked_ticket(id: &str, event_id: &str, created_at: i64) -> IssuedTicket {
    IssuedTicket {
        full_name: Some("****".to_string()),
        email: Some("****".to_string()),
        ..ticket(id, event_id, "****", 0, created_at)
    }
}

/// Provider with one series and its occurrence registered
pub fn provider_with_catalog() -> Arc<InMemoryProvider> {
    let provider = Arc::new(InMemoryProvider::new());
    provider.set_response(
        "/events",
        json!({ "data": [
            { "id": "ev_1", "name": "Friday", "event_series_id": "es_1" },
            { "id": "ev_2", "name": "Standalone Show" }
        ]}),
    );
    provider.set_response(
        "/event_series",
        json!({ "data": [{ "id": "es_1", "name": "Jazz Nights" }] }),
    );
    provider
}
