//! Events, series, ticket types and bundles
//!
//! Mostly thin passthroughs. The exceptions carry provider quirks:
//! occurrences inherit series ticket types unless they list their own,
//! ticket types bound to explicit occurrences must not leak onto others, and
//! publishing a series twice is reported as a no-op instead of an error.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use ticketdesk_types::{Event, EventSeries, ProviderPage, TicketType};

use crate::client::{decode, form, Form, TicketingApi};
use crate::error::{ProviderError, ProviderResult};

/// Description sent when a bundle has none; the provider rejects blank ones
pub const DEFAULT_BUNDLE_DESCRIPTION: &str = "No description provided.";

/// New event request. Creates a series when `event_series_id` is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub venue_name: Option<String>,
    #[serde(default)]
    pub venue_postcode: Option<String>,
    #[serde(default)]
    pub venue_country: Option<String>,
    /// ISO-8601 start
    pub start: String,
    /// ISO-8601 end
    pub end: String,
    #[serde(default)]
    pub online_event: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub event_series_id: Option<String>,
}

/// New or renamed series
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesDraft {
    pub name: String,
}

/// New ticket group
#[derive(Debug, Clone, Deserialize)]
pub struct TicketGroupDraft {
    pub name: String,
}

/// New bundle. `ticket_types` maps ticket type ID to units per bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleDraft {
    pub name: String,
    /// Price in minor units
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub ticket_types: BTreeMap<String, i64>,
}

/// New ticket type on a single occurrence
#[derive(Debug, Clone, Deserialize)]
pub struct TicketTypeDraft {
    pub name: String,
    /// Price in major units (e.g. dollars)
    pub price: f64,
    pub quantity: i64,
    pub max_per_order: i64,
    pub event_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
}

/// Ticket types offered on an occurrence
#[derive(Debug, Clone, Serialize)]
pub struct EventTickets {
    pub data: Vec<TicketType>,
    pub groups: Vec<Value>,
}

/// Catalog operations against the provider
pub struct Catalog {
    api: Arc<dyn TicketingApi>,
}

impl Catalog {
    /// Create a new catalog
    pub fn new(api: Arc<dyn TicketingApi>) -> Self {
        Self { api }
    }

    // ---- Events ----

    pub async fn list_events(&self) -> ProviderResult<Value> {
        self.api.get("/events", &[]).await
    }

    pub async fn get_event(&self, event_id: &str) -> ProviderResult<Value> {
        self.api.get(&format!("/events/{event_id}"), &[]).await
    }

    /// Create an occurrence, creating its series first if needed
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_event(&self, draft: &EventDraft) -> ProviderResult<Value> {
        let start = parse_timestamp(&draft.start)?;
        let end = parse_timestamp(&draft.end)?;

        let series_id = match draft.event_series_id.as_deref().filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let created = self.api.post("/event_series", &series_form(draft)).await?;
                let id = created
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProviderError::Decode("created series has no id".to_string())
                    })?
                    .to_string();
                info!(series_id = %id, "Created event series");
                id
            }
        };

        let occurrence = form([
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("start_time", start.format("%H:%M:%S").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
            ("end_time", end.format("%H:%M:%S").to_string()),
        ]);

        self.api
            .post(&format!("/event_series/{series_id}/events"), &occurrence)
            .await
    }

    /// Rename an occurrence by updating its parent series
    #[instrument(skip(self, draft))]
    pub async fn update_event(&self, event_id: &str, draft: &EventDraft) -> ProviderResult<Value> {
        let series_id = self.series_of(event_id).await?;
        let body = form([
            ("name", draft.name.clone()),
            ("description", draft.description.clone().unwrap_or_default()),
        ]);
        self.api
            .put(&format!("/event_series/{series_id}"), &body)
            .await?;
        Ok(json!({"status": "success", "message": "Event series updated"}))
    }

    /// Delete an occurrence by deleting its parent series
    #[instrument(skip(self))]
    pub async fn delete_event(&self, event_id: &str) -> ProviderResult<Value> {
        let series_id = self.series_of(event_id).await?;
        self.api
            .delete(&format!("/event_series/{series_id}"))
            .await
    }

    /// Ticket types purchasable on one occurrence.
    ///
    /// Explicit occurrence ticket types win; without them the series
    /// defaults apply. Either way types bound to other occurrences are
    /// dropped.
    #[instrument(skip(self))]
    pub async fn event_tickets(&self, event_id: &str) -> ProviderResult<EventTickets> {
        let event: Event = decode(self.get_event(event_id).await?)?;

        let series = match event.event_series_id.as_deref() {
            Some(series_id) => Some(self.get_series_record(series_id).await?),
            None => None,
        };

        let candidates = if event.ticket_types.is_empty() {
            series
                .as_ref()
                .map(|s| s.default_ticket_types.clone())
                .unwrap_or_default()
        } else {
            event.ticket_types
        };

        let data: Vec<TicketType> = candidates
            .into_iter()
            .filter(|t| t.applies_to(event_id))
            .collect();

        debug!(count = data.len(), "Resolved occurrence ticket types");

        Ok(EventTickets {
            data,
            groups: series.map(|s| s.default_ticket_groups).unwrap_or_default(),
        })
    }

    async fn series_of(&self, event_id: &str) -> ProviderResult<String> {
        let event: Event = decode(self.get_event(event_id).await?)?;
        event
            .event_series_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidRequest(format!("event {event_id} has no event series"))
            })
    }

    // ---- Series ----

    pub async fn list_series(&self) -> ProviderResult<Value> {
        self.api.get("/event_series", &[]).await
    }

    pub async fn get_series(&self, series_id: &str) -> ProviderResult<Value> {
        self.api
            .get(&format!("/event_series/{series_id}"), &[])
            .await
    }

    async fn get_series_record(&self, series_id: &str) -> ProviderResult<EventSeries> {
        decode(self.get_series(series_id).await?)
    }

    pub async fn create_series(&self, draft: &SeriesDraft) -> ProviderResult<Value> {
        self.api
            .post("/event_series", &form([("name", draft.name.clone())]))
            .await
    }

    pub async fn update_series(&self, series_id: &str, draft: &SeriesDraft) -> ProviderResult<Value> {
        self.api
            .put(
                &format!("/event_series/{series_id}"),
                &form([("name", draft.name.clone())]),
            )
            .await
    }

    pub async fn delete_series(&self, series_id: &str) -> ProviderResult<Value> {
        self.api
            .delete(&format!("/event_series/{series_id}"))
            .await
    }

    /// Publish a series; publishing a published series is not an error
    pub async fn publish_series(&self, series_id: &str) -> ProviderResult<Value> {
        self.set_series_status(series_id, "published", "already_published")
            .await
    }

    /// Return a series to draft; unpublishing a draft is not an error
    pub async fn unpublish_series(&self, series_id: &str) -> ProviderResult<Value> {
        self.set_series_status(series_id, "draft", "already_draft")
            .await
    }

    #[instrument(skip(self))]
    async fn set_series_status(
        &self,
        series_id: &str,
        status: &str,
        unchanged: &str,
    ) -> ProviderResult<Value> {
        match self
            .api
            .post(
                &format!("/event_series/{series_id}/status"),
                &form([("status", status)]),
            )
            .await
        {
            Ok(value) => Ok(value),
            Err(e) if is_status_unchanged(&e) => {
                debug!(status, "Series status already set");
                Ok(json!({ "status": unchanged }))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_ticket_group(
        &self,
        series_id: &str,
        draft: &TicketGroupDraft,
    ) -> ProviderResult<Value> {
        self.api
            .post(
                &format!("/event_series/{series_id}/ticket_groups"),
                &form([("name", draft.name.clone())]),
            )
            .await
    }

    pub async fn delete_ticket_group(&self, series_id: &str, group_id: &str) -> ProviderResult<Value> {
        self.api
            .delete(&format!("/event_series/{series_id}/ticket_groups/{group_id}"))
            .await
    }

    // ---- Bundles ----

    /// List bundles; a series the provider has no bundle record for lists
    /// as empty
    pub async fn list_bundles(&self, series_id: &str) -> ProviderResult<Value> {
        match self
            .api
            .get(&format!("/event_series/{series_id}/bundles"), &[])
            .await
        {
            Err(e) if e.is_not_found() => Ok(json!({ "data": [] })),
            other => other,
        }
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_bundle(&self, series_id: &str, draft: &BundleDraft) -> ProviderResult<Value> {
        self.api
            .post(
                &format!("/event_series/{series_id}/bundles"),
                &bundle_form(draft),
            )
            .await
    }

    pub async fn delete_bundle(&self, series_id: &str, bundle_id: &str) -> ProviderResult<Value> {
        self.api
            .delete(&format!("/event_series/{series_id}/bundles/{bundle_id}"))
            .await
    }

    // ---- Ticket types ----

    /// Ticket types of one occurrence, or of every occurrence when
    /// `event_id` is `None`.
    ///
    /// Across occurrences, each type is tagged with the first occurrence it
    /// applies to and listed once.
    #[instrument(skip(self))]
    pub async fn list_ticket_types(&self, event_id: Option<&str>) -> ProviderResult<Value> {
        if let Some(event_id) = event_id {
            let event: Event = decode(self.get_event(event_id).await?)?;
            return Ok(json!({ "data": event.ticket_types }));
        }

        let events: ProviderPage<Event> = decode(self.list_events().await?)?;
        Ok(json!({ "data": collect_ticket_types(events.data) }))
    }

    /// Create a ticket type on the occurrence's series, bound to that
    /// occurrence only
    #[instrument(skip(self, draft), fields(event_id = %draft.event_id))]
    pub async fn create_ticket_type(&self, draft: &TicketTypeDraft) -> ProviderResult<Value> {
        let series_id = self.series_of(&draft.event_id).await?;
        self.api
            .post(
                &format!("/event_series/{series_id}/ticket_types"),
                &ticket_type_form(draft),
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_ticket_type(&self, ticket_type_id: &str, event_id: &str) -> ProviderResult<Value> {
        let series_id = self.series_of(event_id).await?;
        self.api
            .delete(&format!(
                "/event_series/{series_id}/ticket_types/{ticket_type_id}"
            ))
            .await
    }
}

/// Whether a status change was refused only because nothing would change
fn is_status_unchanged(error: &ProviderError) -> bool {
    matches!(
        error,
        ProviderError::Rejected { message, error_code: Some(code), .. }
            if code == "VALIDATION_ERROR" && message.contains("what it was before")
    )
}

/// Flatten ticket types across occurrences, honouring explicit bindings and
/// keeping the first copy of each ID
pub fn collect_ticket_types(events: Vec<Event>) -> Vec<TicketType> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for event in events {
        for mut ticket_type in event.ticket_types {
            if !ticket_type.applies_to(&event.id) || !seen.insert(ticket_type.id.clone()) {
                continue;
            }
            ticket_type
                .extra
                .insert("event_id".to_string(), Value::String(event.id.clone()));
            out.push(ticket_type);
        }
    }
    out
}

fn series_form(draft: &EventDraft) -> Form {
    let flag = |b: bool| if b { "true" } else { "false" };

    let mut body = form([
        ("name", draft.name.clone()),
        ("description", draft.description.clone().unwrap_or_default()),
        ("online_event", flag(draft.online_event).to_string()),
        ("private", flag(draft.private).to_string()),
    ]);

    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
    if let Some(venue) = non_empty(&draft.venue_name) {
        body.push(("venue_name".to_string(), venue));
    }
    // Online events keep only the venue name (used for the meeting link)
    if !draft.online_event {
        if let Some(postcode) = non_empty(&draft.venue_postcode) {
            body.push(("venue_postcode".to_string(), postcode));
        }
        if let Some(country) = non_empty(&draft.venue_country) {
            body.push(("venue_country".to_string(), country));
        }
    }
    body
}

/// Form body for a bundle; each line is sent as `ticket_type_ids[<id>]`
pub fn bundle_form(draft: &BundleDraft) -> Form {
    #[allow(clippy::cast_possible_truncation)]
    let price = draft.price.trunc() as i64;

    let description = draft
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_BUNDLE_DESCRIPTION);

    let mut body = form([
        ("name", draft.name.clone()),
        ("price", price.to_string()),
        ("description", description.to_string()),
    ]);
    body.extend(
        draft
            .ticket_types
            .iter()
            .map(|(id, qty)| (format!("ticket_type_ids[{id}]"), qty.to_string())),
    );
    body
}

/// Form body for a ticket type. Prices convert to minor units and the group
/// ID is sent as a bare integer.
pub fn ticket_type_form(draft: &TicketTypeDraft) -> Form {
    #[allow(clippy::cast_possible_truncation)]
    let price = (draft.price * 100.0).round() as i64;

    let mut body = form([
        ("name", draft.name.clone()),
        ("price", price.to_string()),
        ("quantity", draft.quantity.to_string()),
        ("max_per_order", draft.max_per_order.to_string()),
        ("event_ids", draft.event_id.clone()),
    ]);

    if let Some(group) = draft
        .group_id
        .as_deref()
        .and_then(|g| g.trim_start_matches("tg_").parse::<i64>().ok())
    {
        body.push(("groupId".to_string(), group.to_string()));
    }
    body
}

/// Parse an ISO-8601 timestamp, with or without an offset
fn parse_timestamp(value: &str) -> ProviderResult<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map_err(|_| ProviderError::InvalidRequest(format!("invalid timestamp: {value}")))
}
