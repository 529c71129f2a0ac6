//! Provider catalog types: event series, occurrences, ticket types, bundles,
//! discounts and orders.
//!
//! Every record keeps unrecognised provider fields in `extra` so handlers can
//! return provider-shaped JSON without losing data.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ticket::int_like;

type Extra = serde_json::Map<String, serde_json::Value>;

/// A page of results from a provider list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPage<T> {
    /// Page items
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Pagination links
    #[serde(default)]
    pub links: Option<PageLinks>,
}

impl<T> ProviderPage<T> {
    /// Whether the provider advertises another page
    pub fn has_next(&self) -> bool {
        self.links
            .as_ref()
            .and_then(|l| l.next.as_deref())
            .is_some_and(|next| !next.is_empty())
    }
}

/// Pagination links
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLinks {
    /// URL of the next page, if any
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the previous page, if any
    #[serde(default)]
    pub previous: Option<String>,
}

/// Ticket type, either a series default or an occurrence override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketType {
    /// Ticket type ID
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Price in minor currency units
    #[serde(default, deserialize_with = "int_like")]
    pub price: i64,
    /// Remaining stock
    #[serde(default, deserialize_with = "int_like")]
    pub quantity: i64,
    /// Occurrences this ticket type is restricted to; empty means unrestricted
    #[serde(default, deserialize_with = "id_list")]
    pub event_ids: Vec<String>,
    /// Ticket group
    #[serde(default)]
    pub group_id: Option<String>,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Extra,
}

impl TicketType {
    /// Whether this ticket type may be offered on the given occurrence.
    ///
    /// Ticket types bound to explicit occurrences never leak onto others.
    pub fn applies_to(&self, event_id: &str) -> bool {
        self.event_ids.is_empty() || self.event_ids.iter().any(|id| id == event_id)
    }
}

/// Start/end descriptor on an occurrence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTime {
    /// Human formatted date
    #[serde(default)]
    pub formatted: Option<String>,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub iso: Option<String>,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// Venue descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    /// Venue name
    #[serde(default)]
    pub name: Option<String>,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// An event occurrence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID (`ev_…`)
    pub id: String,
    /// Occurrence name (usually the series name)
    #[serde(default)]
    pub name: Option<String>,
    /// Parent series
    #[serde(default)]
    pub event_series_id: Option<String>,
    /// Explicit ticket types for this occurrence
    #[serde(default)]
    pub ticket_types: Vec<TicketType>,
    /// Start time
    #[serde(default)]
    pub start: Option<EventTime>,
    /// Venue
    #[serde(default)]
    pub venue: Option<Venue>,
    /// Online flag (`"true"`/`"false"` on the wire)
    #[serde(default)]
    pub online_event: Option<serde_json::Value>,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Extra,
}

impl Event {
    /// Whether the provider marks this as an online event
    pub fn is_online(&self) -> bool {
        match &self.online_event {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

/// One ticket line required by a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleLine {
    /// Ticket type ID
    pub id: String,
    /// Units of this ticket type per bundle
    #[serde(default = "default_line_quantity", deserialize_with = "int_like")]
    pub quantity: i64,
}

const fn default_line_quantity() -> i64 {
    1
}

/// A bundle of ticket types sold together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle ID
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Price in minor currency units
    #[serde(default, deserialize_with = "int_like")]
    pub price: i64,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Required ticket lines, in provider order
    #[serde(default)]
    pub ticket_types: Vec<BundleLine>,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// A bundle enriched with purchasability computed from ticket inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleAvailability {
    /// The provider bundle
    #[serde(flatten)]
    pub bundle: Bundle,
    /// True only if every required line can be fulfilled at least once
    pub is_available: bool,
    /// How many bundles can be sold against current stock
    pub max_quantity: i64,
    /// Known stock per required ticket type (`None` when unknown)
    pub ticket_inventory: BTreeMap<String, Option<i64>>,
}

/// Event series (the provider's master record for occurrences)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSeries {
    /// Series ID (`es_…`)
    pub id: String,
    /// Series name
    #[serde(default)]
    pub name: Option<String>,
    /// Publish status
    #[serde(default)]
    pub status: Option<String>,
    /// Ticket types inherited by occurrences without overrides
    #[serde(default)]
    pub default_ticket_types: Vec<TicketType>,
    /// Ticket groups defined on the series
    #[serde(default)]
    pub default_ticket_groups: Vec<serde_json::Value>,
    /// Bundles sold on the series
    #[serde(default)]
    pub bundles: Vec<Bundle>,
    /// Venue
    #[serde(default)]
    pub venue: Option<Venue>,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Extra,
}

/// Percentage discount code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    /// Discount ID
    pub id: String,
    /// Redeemable code
    #[serde(default)]
    pub code: Option<String>,
    /// Percentage off face value
    #[serde(default)]
    pub face_value_percentage: Option<f64>,
    /// Ticket types the code applies to
    #[serde(default)]
    pub ticket_types: Vec<serde_json::Value>,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Extra,
}

impl Discount {
    /// IDs of the ticket types bound to this discount
    pub fn ticket_type_ids(&self) -> Vec<String> {
        self.ticket_types
            .iter()
            .filter_map(|t| t.get("id").and_then(|id| id.as_str()))
            .map(str::to_string)
            .collect()
    }
}

/// New discount request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountDraft {
    /// Code (also used as the discount name)
    pub code: String,
    /// Percentage off
    pub percentage: f64,
    /// Ticket types the code applies to
    #[serde(default)]
    pub ticket_type_ids: Vec<String>,
}

/// Partial discount update; absent fields keep their old values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscountPatch {
    /// New code
    #[serde(default)]
    pub code: Option<String>,
    /// New percentage
    #[serde(default)]
    pub percentage: Option<f64>,
}

/// Buyer details nested on a provider order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyerDetails {
    /// Buyer name
    #[serde(default)]
    pub name: Option<String>,
    /// Buyer email
    #[serde(default)]
    pub email: Option<String>,
}

/// Provider order (the coarse grouping the provider keeps itself)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOrder {
    /// Order ID (`or_…`)
    pub id: String,
    /// Buyer name
    #[serde(default)]
    pub buyer_name: Option<String>,
    /// Buyer email
    #[serde(default)]
    pub buyer_email: Option<String>,
    /// Nested buyer details, used when the flat fields are absent
    #[serde(default)]
    pub buyer_details: Option<BuyerDetails>,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: Extra,
}

impl ProviderOrder {
    /// Buyer name, preferring the flat field
    pub fn buyer_name(&self) -> Option<&str> {
        self.buyer_name
            .as_deref()
            .or_else(|| self.buyer_details.as_ref()?.name.as_deref())
    }

    /// Buyer email, preferring the flat field
    pub fn buyer_email(&self) -> Option<&str> {
        self.buyer_email
            .as_deref()
            .or_else(|| self.buyer_details.as_ref()?.email.as_deref())
    }
}

/// Accept either a JSON array of IDs or a comma separated string.
fn id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdList {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<IdList>::deserialize(deserializer)? {
        Some(IdList::List(ids)) => ids,
        Some(IdList::Joined(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    })
}
