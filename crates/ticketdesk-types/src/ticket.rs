//! Issued ticket records as returned by the ticketing provider

use serde::{Deserialize, Deserializer, Serialize};

/// Literal the provider substitutes for redacted PII
pub const MASK_SENTINEL: &str = "****";

/// An individual ticket issued by the provider.
///
/// This is the provider's only durable "order" granularity. Fields the
/// provider returns but ticketdesk does not interpret are kept in `extra` so
/// the record can be passed back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuedTicket {
    /// Issued ticket ID (`it_…`)
    pub id: String,
    /// Barcode printed on the ticket
    #[serde(default)]
    pub barcode: Option<String>,
    /// Event occurrence the ticket admits to
    #[serde(default)]
    pub event_id: String,
    /// Ticket type ID
    #[serde(default)]
    pub ticket_type_id: Option<String>,
    /// Attendee name, possibly masked
    #[serde(default)]
    pub full_name: Option<String>,
    /// Attendee email, possibly masked
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form reference; ticketdesk stores `name|email` here
    #[serde(default)]
    pub reference: Option<String>,
    /// Price in minor currency units
    #[serde(default, deserialize_with = "int_like")]
    pub listed_price: i64,
    /// Whether the ticket has been scanned
    #[serde(default, deserialize_with = "bool_like")]
    pub checked_in: bool,
    /// Provider status (e.g. `valid`, `void`)
    #[serde(default)]
    pub status: Option<String>,
    /// Creation time (Unix timestamp)
    #[serde(default, deserialize_with = "int_like")]
    pub created_at: i64,
    /// Provider order the ticket belongs to
    #[serde(default)]
    pub order_id: Option<String>,
    /// Remaining provider fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Returns true when a PII value is absent, empty, or redacted.
pub fn is_masked(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.trim().is_empty() || v.contains(MASK_SENTINEL),
    }
}

impl IssuedTicket {
    /// Whether either PII field on the record is unusable as-is
    pub fn looks_masked(&self) -> bool {
        is_masked(self.full_name.as_deref()) || is_masked(self.email.as_deref())
    }
}

/// Accept JSON booleans as well as the provider's `"true"`/`"false"` strings.
fn bool_like<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolLike {
        Bool(bool),
        Text(String),
        Number(i64),
    }

    Ok(match Option::<BoolLike>::deserialize(deserializer)? {
        Some(BoolLike::Bool(b)) => b,
        Some(BoolLike::Text(s)) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        Some(BoolLike::Number(n)) => n != 0,
        None => false,
    })
}

/// Accept integers, numeric strings, and null (as zero).
pub(crate) fn int_like<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntLike {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Option::<IntLike>::deserialize(deserializer)? {
        Some(IntLike::Int(n)) => Ok(n),
        #[allow(clippy::cast_possible_truncation)]
        Some(IntLike::Float(f)) => Ok(f.round() as i64),
        Some(IntLike::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom),
        None => Ok(0),
    }
}
