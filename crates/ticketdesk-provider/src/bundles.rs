//! Bundle availability
//!
//! A bundle is purchasable only while every ticket line it requires can be
//! fulfilled. Stock is summed across the series' occurrences and backfilled
//! from series defaults; a line whose stock is unknown makes the bundle
//! unavailable.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, instrument};

use ticketdesk_types::{Bundle, BundleAvailability, Event, EventSeries, ProviderPage, TicketType};

use crate::client::{decode, TicketingApi};
use crate::error::ProviderResult;

/// Known stock per ticket type ID
pub type Inventory = HashMap<String, i64>;

/// Computes bundle purchasability for a series
pub struct BundleCalculator {
    api: Arc<dyn TicketingApi>,
}

impl BundleCalculator {
    /// Create a new calculator
    pub fn new(api: Arc<dyn TicketingApi>) -> Self {
        Self { api }
    }

    /// Compute availability for every bundle on a series.
    ///
    /// Series without bundles return early without any inventory lookups.
    #[instrument(skip(self))]
    pub async fn compute_availability(
        &self,
        series_id: &str,
    ) -> ProviderResult<Vec<BundleAvailability>> {
        let series: EventSeries =
            decode(self.api.get(&format!("/event_series/{series_id}"), &[]).await?)?;

        if series.bundles.is_empty() {
            debug!("Series has no bundles");
            return Ok(Vec::new());
        }

        let occurrences: ProviderPage<Event> = decode(
            self.api
                .get(&format!("/event_series/{series_id}/events"), &[])
                .await?,
        )?;

        let inventory = build_inventory(&occurrences.data, &series.default_ticket_types);
        debug!(
            bundles = series.bundles.len(),
            ticket_types = inventory.len(),
            "Computing bundle availability"
        );

        Ok(series
            .bundles
            .into_iter()
            .map(|bundle| compute_bundle_availability(bundle, &inventory))
            .collect())
    }
}

/// Sum remaining stock per ticket type over every occurrence, then add series
/// defaults for types no occurrence lists.
pub fn build_inventory(occurrences: &[Event], series_defaults: &[TicketType]) -> Inventory {
    let mut inventory = Inventory::new();

    for ticket_type in occurrences.iter().flat_map(|e| &e.ticket_types) {
        *inventory.entry(ticket_type.id.clone()).or_insert(0) += ticket_type.quantity;
    }

    for ticket_type in series_defaults {
        inventory
            .entry(ticket_type.id.clone())
            .or_insert(ticket_type.quantity);
    }

    inventory
}

/// Derive availability for one bundle from known stock
pub fn compute_bundle_availability(bundle: Bundle, inventory: &Inventory) -> BundleAvailability {
    let mut ticket_inventory = BTreeMap::new();
    let mut is_available = !bundle.ticket_types.is_empty();
    let mut max_quantity: Option<i64> = None;

    for line in &bundle.ticket_types {
        let stock = inventory.get(&line.id).copied();
        ticket_inventory.insert(line.id.clone(), stock);

        let purchasable = match stock {
            Some(stock) if line.quantity > 0 => stock.max(0) / line.quantity,
            _ => 0,
        };

        if purchasable == 0 {
            is_available = false;
        }
        max_quantity = Some(max_quantity.map_or(purchasable, |m| m.min(purchasable)));
    }

    BundleAvailability {
        bundle,
        is_available,
        max_quantity: max_quantity.unwrap_or(0),
        ticket_inventory,
    }
}
