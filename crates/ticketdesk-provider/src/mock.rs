//! In-memory ticketing provider for tests.
//!
//! Behaves like the provider for the endpoints ticketdesk leans on
//! (issued tickets with cursor pagination, issuance, discounts, check-ins)
//! and serves canned JSON for everything else. Failures can be injected per
//! endpoint or per ticket type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};

use ticketdesk_types::IssuedTicket;

use crate::client::{Form, TicketingApi};
use crate::error::{ProviderError, ProviderResult};

/// Injected failure: an HTTP status and body, or status 0 for a transport
/// error
#[derive(Debug, Clone)]
struct Failure {
    status: u16,
    body: String,
}

impl Failure {
    fn to_error(&self) -> ProviderError {
        if self.status == 0 {
            ProviderError::Transport(self.body.clone())
        } else {
            ProviderError::from_response(self.status, &self.body)
        }
    }
}

/// In-memory provider
#[derive(Default)]
pub struct InMemoryProvider {
    tickets: Mutex<Vec<IssuedTicket>>,
    responses: DashMap<String, Value>,
    failures: DashMap<String, Failure>,
    /// Remaining successful issuances per ticket type; absent means unlimited
    issuance_budget: DashMap<String, u32>,
    prices: DashMap<String, i64>,
    discounts: DashMap<String, Value>,
    calls: Mutex<Vec<(String, String, Form)>>,
    next_id: AtomicU64,
}

impl InMemoryProvider {
    /// Create an empty provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ---- Setup ----

    /// Seed an issued ticket
    pub fn add_ticket(&self, ticket: IssuedTicket) {
        self.lock_tickets().push(ticket);
    }

    /// Serve `value` for `GET endpoint`
    pub fn set_response(&self, endpoint: &str, value: Value) {
        self.responses.insert(endpoint.to_string(), value);
    }

    /// Seed a discount record
    pub fn add_discount(&self, discount: Value) {
        if let Some(id) = discount.get("id").and_then(Value::as_str) {
            self.discounts.insert(id.to_string(), discount.clone());
        }
    }

    /// Listed price for tickets issued with this ticket type
    pub fn set_price(&self, ticket_type_id: &str, price: i64) {
        self.prices.insert(ticket_type_id.to_string(), price);
    }

    /// Fail `method endpoint` with the given status and JSON message
    pub fn fail(&self, method: &str, endpoint: &str, status: u16, message: &str) {
        self.failures.insert(
            format!("{method} {endpoint}"),
            Failure {
                status,
                body: json!({ "message": message }).to_string(),
            },
        );
    }

    /// Fail `method endpoint` with a transport error
    pub fn fail_transport(&self, method: &str, endpoint: &str) {
        self.failures.insert(
            format!("{method} {endpoint}"),
            Failure {
                status: 0,
                body: "connection reset".to_string(),
            },
        );
    }

    /// Remove an injected endpoint failure
    pub fn clear_failure(&self, method: &str, endpoint: &str) {
        self.failures.remove(&format!("{method} {endpoint}"));
    }

    /// Allow only `n` more issuances of this ticket type
    pub fn limit_issuance(&self, ticket_type_id: &str, n: u32) {
        self.issuance_budget.insert(ticket_type_id.to_string(), n);
    }

    /// Lift an issuance limit
    pub fn allow_issuance(&self, ticket_type_id: &str) {
        self.issuance_budget.remove(ticket_type_id);
    }

    // ---- Inspection ----

    /// All issued tickets, in issue order
    pub fn issued_tickets(&self) -> Vec<IssuedTicket> {
        self.lock_tickets().clone()
    }

    /// Number of calls made with `method` to `endpoint`
    pub fn call_count(&self, method: &str, endpoint: &str) -> usize {
        self.lock_calls()
            .iter()
            .filter(|(m, e, _)| m == method && e == endpoint)
            .count()
    }

    /// Form bodies posted to `endpoint`, in order
    pub fn posted_forms(&self, endpoint: &str) -> Vec<Form> {
        self.lock_calls()
            .iter()
            .filter(|(m, e, _)| m == "POST" && e == endpoint)
            .map(|(_, _, f)| f.clone())
            .collect()
    }

    /// Current discounts
    pub fn discounts(&self) -> Vec<Value> {
        self.discounts.iter().map(|d| d.value().clone()).collect()
    }

    // ---- Internals ----

    fn lock_tickets(&self) -> std::sync::MutexGuard<'_, Vec<IssuedTicket>> {
        self.tickets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<(String, String, Form)>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, method: &str, endpoint: &str, form: &[(String, String)]) -> ProviderResult<()> {
        self.lock_calls()
            .push((method.to_string(), endpoint.to_string(), form.to_vec()));

        match self.failures.get(&format!("{method} {endpoint}")) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    fn list_tickets(&self, query: &[(&str, &str)]) -> Value {
        let param = |k: &str| query.iter().find(|(key, _)| *key == k).map(|(_, v)| *v);
        let tickets = self.lock_tickets();

        if let Some(barcode) = param("barcode") {
            let data: Vec<&IssuedTicket> = tickets
                .iter()
                .filter(|t| t.barcode.as_deref() == Some(barcode))
                .collect();
            return json!({ "data": data, "links": { "next": null } });
        }

        let limit = param("limit")
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(100)
            .max(1);
        let start = param("starting_after")
            .and_then(|after| tickets.iter().position(|t| t.id == after))
            .map_or(0, |pos| pos + 1);

        let page: Vec<&IssuedTicket> = tickets.iter().skip(start).take(limit).collect();
        let next = (start + page.len() < tickets.len())
            .then(|| page.last().map(|t| format!("/v1/issued_tickets?starting_after={}", t.id)))
            .flatten();

        json!({ "data": page, "links": { "next": next } })
    }

    fn issue(&self, form: &[(String, String)]) -> ProviderResult<Value> {
        let field = |k: &str| {
            form.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
        };

        let ticket_type_id = field("ticket_type_id")
            .ok_or_else(|| ProviderError::from_response(422, r#"{"message":"ticket_type_id is required"}"#))?;

        if let Some(mut budget) = self.issuance_budget.get_mut(&ticket_type_id) {
            if *budget == 0 {
                return Err(ProviderError::from_response(
                    422,
                    r#"{"message":"Not enough tickets remaining","error_code":"VALIDATION_ERROR"}"#,
                ));
            }
            *budget -= 1;
        }

        let n = self.next();
        let ticket = IssuedTicket {
            id: format!("it_{n}"),
            barcode: Some(format!("BC{n:06}")),
            event_id: field("event_id").unwrap_or_default(),
            ticket_type_id: Some(ticket_type_id.clone()),
            // The provider masks PII it did not collect itself
            full_name: Some("****".to_string()),
            email: Some("****".to_string()),
            reference: field("reference"),
            listed_price: self.prices.get(&ticket_type_id).map_or(0, |p| *p),
            checked_in: false,
            status: Some("valid".to_string()),
            created_at: i64::try_from(n).unwrap_or(i64::MAX),
            order_id: None,
            extra: serde_json::Map::new(),
        };

        let value = serde_json::to_value(&ticket).map_err(|e| ProviderError::Decode(e.to_string()))?;
        self.lock_tickets().push(ticket);
        Ok(value)
    }

    fn create_discount(&self, form: &[(String, String)]) -> Value {
        let field = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        let id = format!("di_{}", self.next());

        let ticket_types: Vec<Value> = field("ticket_type_ids")
            .map(|ids| {
                ids.split(',')
                    .filter(|s| !s.is_empty())
                    .map(|id| json!({ "id": id }))
                    .collect()
            })
            .unwrap_or_default();

        let discount = json!({
            "id": id,
            "code": field("code"),
            "name": field("name"),
            "face_value_percentage": field("price_percent").and_then(|p| p.parse::<f64>().ok()),
            "ticket_types": ticket_types,
        });
        self.discounts.insert(id, discount.clone());
        discount
    }

    fn check_in(&self, form: &[(String, String)]) -> ProviderResult<Value> {
        let ticket_id = form
            .iter()
            .find(|(k, _)| k == "issued_ticket_id")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        let mut tickets = self.lock_tickets();
        let ticket = tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| ProviderError::NotFound(format!("issued ticket {ticket_id}")))?;

        if ticket.checked_in {
            return Err(ProviderError::from_response(
                400,
                r#"{"message":"Ticket is already checked in"}"#,
            ));
        }
        ticket.checked_in = true;
        Ok(json!({ "id": format!("ch_{}", self.next()), "issued_ticket_id": ticket_id }))
    }
}

#[async_trait]
impl TicketingApi for InMemoryProvider {
    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> ProviderResult<Value> {
        self.record("GET", endpoint, &[])?;

        if endpoint == "/issued_tickets" {
            return Ok(self.list_tickets(query));
        }
        if let Some(id) = endpoint.strip_prefix("/issued_tickets/") {
            let tickets = self.lock_tickets();
            let ticket = tickets
                .iter()
                .find(|t| t.id == id)
                .ok_or_else(|| ProviderError::NotFound(format!("issued ticket {id}")))?;
            return serde_json::to_value(ticket).map_err(|e| ProviderError::Decode(e.to_string()));
        }
        if endpoint == "/discounts" {
            let mut data = self.discounts();
            data.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
            return Ok(json!({ "data": data }));
        }
        if let Some(id) = endpoint.strip_prefix("/discounts/") {
            return self
                .discounts
                .get(id)
                .map(|d| d.value().clone())
                .ok_or_else(|| ProviderError::NotFound(format!("discount {id}")));
        }

        self.responses
            .get(endpoint)
            .map(|v| v.value().clone())
            .ok_or_else(|| ProviderError::NotFound(endpoint.to_string()))
    }

    async fn post(&self, endpoint: &str, form: &[(String, String)]) -> ProviderResult<Value> {
        self.record("POST", endpoint, form)?;

        match endpoint {
            "/issued_tickets" => self.issue(form),
            "/discounts" => Ok(self.create_discount(form)),
            "/check_ins" => self.check_in(form),
            _ => {
                let mut created = serde_json::Map::new();
                created.insert("id".to_string(), json!(format!("obj_{}", self.next())));
                for (k, v) in form {
                    created.insert(k.clone(), json!(v));
                }
                Ok(Value::Object(created))
            }
        }
    }

    async fn put(&self, endpoint: &str, form: &[(String, String)]) -> ProviderResult<Value> {
        self.record("PUT", endpoint, form)?;
        let fields: serde_json::Map<String, Value> =
            form.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
        Ok(Value::Object(fields))
    }

    async fn delete(&self, endpoint: &str) -> ProviderResult<Value> {
        self.record("DELETE", endpoint, &[])?;

        if let Some(id) = endpoint.strip_prefix("/discounts/") {
            return self
                .discounts
                .remove(id)
                .map(|_| Value::Null)
                .ok_or_else(|| ProviderError::NotFound(format!("discount {id}")));
        }
        Ok(Value::Null)
    }
}

impl std::fmt::Debug for InMemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryProvider")
            .field("tickets", &self.lock_tickets().len())
            .field("discounts", &self.discounts.len())
            .finish_non_exhaustive()
    }
}
