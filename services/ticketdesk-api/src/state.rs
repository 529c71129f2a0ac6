//! Application state for the Ticketdesk API service.

use std::sync::Arc;

use ticketdesk_payments::{FulfillmentService, TicketIssuer};
use ticketdesk_provider::{
    BundleCalculator, Catalog, CheckInService, DiscountService, OrderAggregator, TicketingApi,
};

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Events, series, ticket types and bundles
    pub catalog: Arc<Catalog>,
    /// Buyer-level orders
    pub orders: Arc<OrderAggregator>,
    /// Bundle availability
    pub bundles: Arc<BundleCalculator>,
    /// Discount codes
    pub discounts: Arc<DiscountService>,
    /// Scanner lookups and check-ins
    pub check_ins: Arc<CheckInService>,
    /// Manual order issuance
    pub issuer: Arc<TicketIssuer>,
    /// Checkout, webhooks and pending orders
    pub payments: Arc<FulfillmentService>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state around one provider client
    pub fn new(api: Arc<dyn TicketingApi>, payments: FulfillmentService, config: Config) -> Self {
        Self {
            catalog: Arc::new(Catalog::new(Arc::clone(&api))),
            orders: Arc::new(OrderAggregator::new(Arc::clone(&api), config.provider.page_size)),
            bundles: Arc::new(BundleCalculator::new(Arc::clone(&api))),
            discounts: Arc::new(DiscountService::new(Arc::clone(&api))),
            check_ins: Arc::new(CheckInService::new(Arc::clone(&api))),
            issuer: Arc::new(TicketIssuer::new(api)),
            payments: Arc::new(payments),
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
