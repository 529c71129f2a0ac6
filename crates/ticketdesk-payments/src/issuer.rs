//! Ticket issuance on the ticketing provider
//!
//! The provider issues one ticket per call. Issuance never stops at the first
//! failure: every remaining unit is attempted and per-line progress is
//! reported, so the caller can queue exactly the units that are still owed.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use ticketdesk_provider::{decode, ProviderError, TicketingApi};
use ticketdesk_types::{Event, IssuedTicket, PendingItem};

/// Event name used when nothing better is known
pub const FALLBACK_EVENT_NAME: &str = "Your Event";

/// Date/venue placeholder
pub const TO_BE_ANNOUNCED: &str = "TBA";

/// Venue label for online events
pub const ONLINE_EVENT: &str = "Online Event";

/// Outcome of an issuance pass
#[derive(Debug, Default)]
pub struct IssuanceReport {
    /// Tickets issued in this pass
    pub tickets: Vec<IssuedTicket>,
    /// Lines with updated `issued` counts
    pub items: Vec<PendingItem>,
    /// One message per failed unit
    pub errors: Vec<String>,
    /// First failure, kept typed for callers that surface it
    pub first_error: Option<ProviderError>,
}

impl IssuanceReport {
    /// Whether every owed unit is now issued
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.items.iter().all(|i| i.remaining() == 0)
    }

    /// Units issued in this pass
    pub fn issued_now(&self) -> u32 {
        u32::try_from(self.tickets.len()).unwrap_or(u32::MAX)
    }

    /// Units issued across all passes
    pub fn issued_total(&self) -> u32 {
        self.items.iter().map(|i| i.issued).sum()
    }

    /// Units ordered
    pub fn requested(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Failure messages joined for the pending record
    pub fn error_text(&self) -> String {
        self.errors.join(" | ")
    }
}

/// Who the tickets are for
#[derive(Debug, Clone, Copy)]
pub struct Recipient<'a> {
    /// Event occurrence
    pub event_id: &'a str,
    /// Encoded `name|email` reference
    pub reference: &'a str,
    /// Optional phone
    pub phone: Option<&'a str>,
}

/// Event details shown in confirmations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    /// Event name
    pub name: String,
    /// Human formatted start
    pub date: String,
    /// Venue label
    pub venue: String,
}

/// Issues tickets one unit at a time
#[derive(Clone)]
pub struct TicketIssuer {
    api: Arc<dyn TicketingApi>,
}

impl TicketIssuer {
    /// Create an issuer
    pub fn new(api: Arc<dyn TicketingApi>) -> Self {
        Self { api }
    }

    /// Issue every unit still owed on `items`
    #[instrument(skip(self, recipient, items), fields(event_id = %recipient.event_id))]
    pub async fn issue(&self, recipient: Recipient<'_>, items: Vec<PendingItem>) -> IssuanceReport {
        let mut report = IssuanceReport::default();

        for mut item in items {
            for _ in 0..item.remaining() {
                let form = issuance_form(recipient, &item.ticket_type_id);
                match self.api.post("/issued_tickets", &form).await {
                    Ok(value) => {
                        item.issued += 1;
                        report.tickets.push(issued_ticket(value));
                    }
                    Err(e) => {
                        warn!(ticket_type_id = %item.ticket_type_id, error = %e, "Ticket issuance failed");
                        report
                            .errors
                            .push(format!("{}: {}", item.ticket_type_id, e.provider_message()));
                        report.first_error.get_or_insert(e);
                    }
                }
            }
            report.items.push(item);
        }

        debug!(
            issued = report.issued_now(),
            failed = report.errors.len(),
            "Issuance pass finished"
        );
        report
    }

    /// Event details for a confirmation; `fallback_name` is used when the
    /// event cannot be fetched
    pub async fn describe_event(&self, event_id: &str, fallback_name: &str) -> EventDescriptor {
        let event = match self.api.get(&format!("/events/{event_id}"), &[]).await {
            Ok(value) => decode::<Event>(value),
            Err(e) => Err(e),
        };

        match event {
            Ok(event) => describe(&event, fallback_name),
            Err(e) => {
                warn!(event_id = %event_id, error = %e, "Could not fetch event for confirmation");
                EventDescriptor {
                    name: fallback_name.to_string(),
                    date: TO_BE_ANNOUNCED.to_string(),
                    venue: TO_BE_ANNOUNCED.to_string(),
                }
            }
        }
    }
}

/// Form for one issuance call
pub fn issuance_form(recipient: Recipient<'_>, ticket_type_id: &str) -> Vec<(String, String)> {
    let mut form = vec![
        ("event_id".to_string(), recipient.event_id.to_string()),
        ("ticket_type_id".to_string(), ticket_type_id.to_string()),
        ("reference".to_string(), recipient.reference.to_string()),
        ("send_email".to_string(), "true".to_string()),
    ];
    if let Some(phone) = recipient.phone.filter(|p| !p.trim().is_empty()) {
        form.push(("phone".to_string(), phone.to_string()));
    }
    form
}

// The provider has already issued the ticket; a body we cannot decode keeps
// only what we can read from it.
fn issued_ticket(value: serde_json::Value) -> IssuedTicket {
    match serde_json::from_value::<IssuedTicket>(value.clone()) {
        Ok(ticket) => ticket,
        Err(e) => {
            warn!(error = %e, "Unexpected issued ticket body");
            IssuedTicket {
                id: value["id"].as_str().unwrap_or_default().to_string(),
                barcode: value["barcode"].as_str().map(str::to_string),
                ..IssuedTicket::default()
            }
        }
    }
}

fn describe(event: &Event, fallback_name: &str) -> EventDescriptor {
    let name = event
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(fallback_name)
        .to_string();

    let date = event
        .start
        .as_ref()
        .and_then(|s| s.formatted.clone())
        .unwrap_or_else(|| TO_BE_ANNOUNCED.to_string());

    let venue = match event.venue.as_ref().and_then(|v| v.name.as_deref()) {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ if event.is_online() => ONLINE_EVENT.to_string(),
        _ => TO_BE_ANNOUNCED.to_string(),
    };

    EventDescriptor { name, date, venue }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use ticketdesk_provider::InMemoryProvider;

    use super::*;

    const RECIPIENT: Recipient<'static> = Recipient {
        event_id: "ev_1",
        reference: "Jane|jane@x.com",
        phone: None,
    };

    fn line(id: &str, quantity: u32, issued: u32) -> PendingItem {
        PendingItem {
            ticket_type_id: id.into(),
            quantity,
            issued,
        }
    }

    #[tokio::test]
    async fn test_issues_only_remaining_units() {
        let provider = Arc::new(InMemoryProvider::new());
        let report = TicketIssuer::new(provider.clone())
            .issue(RECIPIENT, vec![line("tt_a", 3, 2), line("tt_b", 1, 0)])
            .await;

        assert!(report.is_complete());
        assert_eq!(report.issued_now(), 2);
        assert_eq!(report.issued_total(), 4);
        assert_eq!(provider.call_count("POST", "/issued_tickets"), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_lines() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.limit_issuance("tt_a", 1);

        let report = TicketIssuer::new(provider)
            .issue(RECIPIENT, vec![line("tt_a", 2, 0), line("tt_b", 1, 0)])
            .await;

        assert!(!report.is_complete());
        assert_eq!(report.items[0].issued, 1);
        assert_eq!(report.items[1].issued, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.error_text().starts_with("tt_a: "));
        assert!(report.first_error.as_ref().is_some_and(ProviderError::is_rejected));
    }

    #[test]
    fn test_form_carries_reference_and_phone() {
        let form = issuance_form(
            Recipient {
                phone: Some("555-0100"),
                ..RECIPIENT
            },
            "tt_a",
        );
        assert!(form.contains(&("reference".into(), "Jane|jane@x.com".into())));
        assert!(form.contains(&("send_email".into(), "true".into())));
        assert!(form.contains(&("phone".into(), "555-0100".into())));
        assert!(!issuance_form(RECIPIENT, "tt_a").iter().any(|(k, _)| k == "phone"));
    }

    #[tokio::test]
    async fn test_describe_event() {
        let provider = Arc::new(InMemoryProvider::new());
        provider.set_response(
            "/events/ev_1",
            json!({ "id": "ev_1", "name": "Jazz", "start": { "formatted": "Fri 3 Oct" }, "online_event": "true" }),
        );
        let issuer = TicketIssuer::new(provider);

        let found = issuer.describe_event("ev_1", "ignored").await;
        assert_eq!(found.name, "Jazz");
        assert_eq!(found.date, "Fri 3 Oct");
        assert_eq!(found.venue, ONLINE_EVENT);

        let missing = issuer.describe_event("ev_404", FALLBACK_EVENT_NAME).await;
        assert_eq!(missing.name, FALLBACK_EVENT_NAME);
        assert_eq!(missing.venue, TO_BE_ANNOUNCED);
    }
}
