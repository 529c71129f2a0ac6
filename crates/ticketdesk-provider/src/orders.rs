//! Order aggregation
//!
//! The provider has no order concept spanning the tickets ticketdesk issues,
//! only individual issued tickets. Orders are rebuilt on every read by
//! grouping tickets per buyer and event.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use ticketdesk_types::{
    Event, EventSeries, IssuedTicket, LogicalOrder, OrderSource, OrderTicket, ProviderPage,
};

use crate::client::{decode, TicketingApi};
use crate::error::ProviderResult;
use crate::pii::{Identity, IdentityResolver, LocalIdentity};

/// Event name used when neither the event nor its series is known
pub const UNKNOWN_EVENT: &str = "Unknown Event";

/// Who a group of tickets belongs to.
///
/// Tickets with a recoverable email group by it. Fully masked tickets fall
/// back to the provider's own order, and only then stand alone, so they do
/// not all collapse into one `****` group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum BuyerKey {
    Email(String),
    ProviderOrder(String),
    Ticket(String),
}

impl BuyerKey {
    fn for_ticket(ticket: &IssuedTicket, local: &LocalIdentity) -> Self {
        if let Some(email) = &local.email {
            return Self::Email(email.trim().to_lowercase());
        }
        match ticket.order_id.as_deref().filter(|id| !id.is_empty()) {
            Some(order_id) => Self::ProviderOrder(order_id.to_string()),
            None => Self::Ticket(ticket.id.clone()),
        }
    }
}

impl std::fmt::Display for BuyerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email(email) => write!(f, "{email}"),
            Self::ProviderOrder(id) => write!(f, "order:{id}"),
            Self::Ticket(id) => write!(f, "ticket:{id}"),
        }
    }
}

/// Builds [`LogicalOrder`] views from the provider's issued tickets
pub struct OrderAggregator {
    api: Arc<dyn TicketingApi>,
    page_size: u32,
}

impl OrderAggregator {
    /// Create a new aggregator
    pub fn new(api: Arc<dyn TicketingApi>, page_size: u32) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
        }
    }

    /// List all orders, newest first
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> ProviderResult<Vec<LogicalOrder>> {
        let tickets = self.fetch_issued_tickets().await?;
        let event_names = self.event_names().await?;

        let mut resolver = IdentityResolver::new(Arc::clone(&self.api));
        let orders = assemble_orders(tickets, &event_names, &mut resolver).await;

        debug!(orders = orders.len(), "Assembled logical orders");
        Ok(orders)
    }

    /// Fetch a provider order as-is
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: &str) -> ProviderResult<Value> {
        self.api.get(&format!("/orders/{order_id}"), &[]).await
    }

    /// Page through every issued ticket.
    #[instrument(skip(self))]
    pub async fn fetch_issued_tickets(&self) -> ProviderResult<Vec<IssuedTicket>> {
        self.fetch_all("/issued_tickets", |t: &IssuedTicket| t.id.clone())
            .await
    }

    /// Page through every record of a list endpoint.
    ///
    /// Uses `limit` + `starting_after` and stops on a short page, an empty
    /// page, or a missing `links.next`.
    async fn fetch_all<T, F>(&self, endpoint: &str, id_of: F) -> ProviderResult<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> String,
    {
        let limit = self.page_size.to_string();
        let mut cursor: Option<String> = None;
        let mut records = Vec::new();

        loop {
            let mut query = vec![("limit", limit.as_str())];
            if let Some(after) = cursor.as_deref() {
                query.push(("starting_after", after));
            }

            let page: ProviderPage<T> = decode(self.api.get(endpoint, &query).await?)?;

            let count = page.data.len();
            let has_next = page.has_next();
            let last_id = page.data.last().map(&id_of);
            records.extend(page.data);

            debug!(endpoint, count, has_next, total = records.len(), "Fetched page");

            let short_page = u32::try_from(count).map_or(false, |c| c < self.page_size);
            match last_id {
                Some(last) if !short_page && has_next && cursor.as_deref() != Some(&last) => {
                    cursor = Some(last);
                }
                _ => break,
            }
        }

        Ok(records)
    }

    /// Map event ID to display name, preferring the parent series' name
    async fn event_names(&self) -> ProviderResult<HashMap<String, String>> {
        let events = self.fetch_all("/events", |e: &Event| e.id.clone()).await?;
        let series = self
            .fetch_all("/event_series", |s: &EventSeries| s.id.clone())
            .await?;

        Ok(build_event_names(&events, &series))
    }
}

/// Map event ID to display name: series name, else event name, else
/// [`UNKNOWN_EVENT`].
pub fn build_event_names(events: &[Event], series: &[EventSeries]) -> HashMap<String, String> {
    let series_names: HashMap<&str, &str> = series
        .iter()
        .filter_map(|s| {
            s.name
                .as_deref()
                .filter(|n| !n.is_empty())
                .map(|n| (s.id.as_str(), n))
        })
        .collect();

    events
        .iter()
        .map(|event| {
            let name = event
                .event_series_id
                .as_deref()
                .and_then(|sid| series_names.get(sid).copied())
                .or_else(|| event.name.as_deref().filter(|n| !n.is_empty()))
                .unwrap_or(UNKNOWN_EVENT);
            (event.id.clone(), name.to_string())
        })
        .collect()
}

/// Group tickets into orders and sort them newest first.
///
/// Every input ticket lands in exactly one order.
pub async fn assemble_orders(
    tickets: Vec<IssuedTicket>,
    event_names: &HashMap<String, String>,
    resolver: &mut IdentityResolver,
) -> Vec<LogicalOrder> {
    let mut groups: BTreeMap<(String, BuyerKey), Vec<(IssuedTicket, LocalIdentity)>> =
        BTreeMap::new();

    for ticket in tickets {
        let local = LocalIdentity::from_ticket(&ticket);
        let key = (ticket.event_id.clone(), BuyerKey::for_ticket(&ticket, &local));
        groups.entry(key).or_default().push((ticket, local));
    }

    let mut orders = Vec::with_capacity(groups.len());
    for ((event_id, buyer_key), mut members) in groups {
        members.sort_by(|(a, _), (b, _)| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let identity = order_identity(&members, resolver).await;

        // Masked members with their own parent order resolve through it
        // before falling back to the group's identity
        for (ticket, local) in &mut members {
            if !local.is_complete() && ticket.looks_masked() {
                *local = resolver.resolve_known(ticket).await;
            }
        }

        let event_name = event_names
            .get(&event_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_EVENT.to_string());

        orders.push(build_order(
            format!("{event_id}:{buyer_key}"),
            event_id,
            event_name,
            &identity,
            members,
        ));
    }

    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    orders
}

/// Pick the buyer identity for a group.
///
/// Unmasked groups use their first ticket as-is. Otherwise the first member
/// whose reference fully identifies the buyer wins, and only if none does is
/// the resolver (and its parent-order fallback) consulted.
async fn order_identity(
    members: &[(IssuedTicket, LocalIdentity)],
    resolver: &mut IdentityResolver,
) -> Identity {
    let Some((first, first_local)) = members.first() else {
        return LocalIdentity::default().or_fallback(None);
    };

    if !members.iter().any(|(t, _)| t.looks_masked()) {
        return first_local.clone().or_fallback(None);
    }

    if let Some((_, local)) = members.iter().find(|(_, l)| l.is_complete()) {
        return local.clone().or_fallback(None);
    }

    resolver.resolve_identity(first).await
}

fn build_order(
    id: String,
    event_id: String,
    event_name: String,
    identity: &Identity,
    members: Vec<(IssuedTicket, LocalIdentity)>,
) -> LogicalOrder {
    let total: i64 = members.iter().map(|(t, _)| t.listed_price).sum();
    let created_at = members
        .iter()
        .map(|(t, _)| t.created_at)
        .min()
        .unwrap_or_default();

    let issued_tickets = members
        .into_iter()
        .map(|(ticket, local)| {
            let holder = local.or_fallback(Some(identity));
            OrderTicket {
                id: ticket.id,
                barcode: ticket.barcode,
                ticket_type_id: ticket.ticket_type_id,
                full_name: holder.name,
                email: holder.email,
                listed_price: ticket.listed_price,
                checked_in: ticket.checked_in,
                status: ticket.status,
                created_at: ticket.created_at,
            }
        })
        .collect();

    LogicalOrder {
        id,
        buyer_name: identity.name.clone(),
        buyer_email: identity.email.clone(),
        event_id,
        event_name,
        total,
        source: OrderSource::from_total(total),
        created_at,
        issued_tickets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_prefer_series() {
        let events: Vec<Event> = serde_json::from_value(serde_json::json!([
            {"id": "ev_1", "name": "Occurrence", "event_series_id": "es_1"},
            {"id": "ev_2", "name": "Standalone"},
            {"id": "ev_3", "event_series_id": "es_missing"},
        ]))
        .unwrap();
        let series: Vec<EventSeries> =
            serde_json::from_value(serde_json::json!([{"id": "es_1", "name": "Jazz Nights"}]))
                .unwrap();

        let names = build_event_names(&events, &series);
        assert_eq!(names["ev_1"], "Jazz Nights");
        assert_eq!(names["ev_2"], "Standalone");
        assert_eq!(names["ev_3"], UNKNOWN_EVENT);
    }

    #[test]
    fn test_buyer_key_falls_back_to_provider_order() {
        let ticket = IssuedTicket {
            id: "it_1".into(),
            email: Some("****".into()),
            order_id: Some("or_9".into()),
            ..Default::default()
        };
        let local = LocalIdentity::from_ticket(&ticket);
        assert_eq!(
            BuyerKey::for_ticket(&ticket, &local),
            BuyerKey::ProviderOrder("or_9".into())
        );
    }

    #[test]
    fn test_buyer_key_normalises_email() {
        let ticket = IssuedTicket {
            id: "it_1".into(),
            email: Some(" A@X.com".into()),
            ..Default::default()
        };
        let local = LocalIdentity::from_ticket(&ticket);
        assert_eq!(
            BuyerKey::for_ticket(&ticket, &local),
            BuyerKey::Email("a@x.com".into())
        );
    }
}
