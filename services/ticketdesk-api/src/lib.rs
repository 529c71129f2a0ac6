//! Ticketdesk API
//!
//! Backend-for-frontend over the ticketing provider and Stripe.
//!
//! ## REST Endpoints
//!
//! - `/event_series` - Series, ticket groups, bundles and bundle availability
//! - `/events` - Occurrences and their purchasable ticket types
//! - `/ticket_types` - Ticket types per occurrence
//! - `/discounts` - Discount codes (updates replace the code)
//! - `/orders` - Buyer-level orders rebuilt from issued tickets, manual orders
//! - `/check_ins` - Door scanner lookups and check-ins
//! - `/payments/*` - Checkout, free orders, Stripe webhook, pending orders
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /metrics` - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use config::{Config, ConfigError};
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Build the HTTP router
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();
    let cors = cors_layer(state.config.cors_origins.as_deref());

    let series_routes = Router::new()
        .route("/event_series", get(handlers::list_series).post(handlers::create_series))
        .route(
            "/event_series/{id}",
            get(handlers::get_series)
                .put(handlers::update_series)
                .delete(handlers::delete_series),
        )
        .route("/event_series/{id}/publish", post(handlers::publish_series))
        .route("/event_series/{id}/unpublish", post(handlers::unpublish_series))
        .route(
            "/event_series/{id}/ticket_groups",
            post(handlers::create_ticket_group),
        )
        .route(
            "/event_series/{id}/ticket_groups/{group_id}",
            delete(handlers::delete_ticket_group),
        )
        .route(
            "/event_series/{id}/bundles",
            get(handlers::list_bundles).post(handlers::create_bundle),
        )
        .route(
            "/event_series/{id}/bundles/availability",
            get(handlers::bundle_availability),
        )
        .route(
            "/event_series/{id}/bundles/{bundle_id}",
            delete(handlers::delete_bundle),
        );

    let catalog_routes = Router::new()
        .route("/events", get(handlers::list_events).post(handlers::create_event))
        .route(
            "/events/{id}",
            get(handlers::get_event)
                .put(handlers::update_event)
                .delete(handlers::delete_event),
        )
        .route("/events/{id}/tickets", get(handlers::event_tickets))
        .route(
            "/ticket_types",
            get(handlers::list_ticket_types).post(handlers::create_ticket_type),
        )
        .route("/ticket_types/{id}", delete(handlers::delete_ticket_type))
        .route(
            "/discounts",
            get(handlers::list_discounts).post(handlers::create_discount),
        )
        .route(
            "/discounts/{id}",
            put(handlers::update_discount).delete(handlers::delete_discount),
        );

    let order_routes = Router::new()
        .route("/orders", get(handlers::list_orders).post(handlers::create_order))
        .route("/orders/{id}", get(handlers::get_order))
        .route("/check_ins", post(handlers::create_check_in))
        .route("/check_ins/{ticket_id}", get(handlers::lookup_ticket));

    let payment_routes = Router::new()
        .route(
            "/payments/create-checkout-session",
            post(handlers::create_checkout_session),
        )
        .route("/payments/create-free-order", post(handlers::create_free_order))
        .route("/payments/pending-orders", get(handlers::list_pending_orders))
        .route(
            "/payments/pending-orders/{id}/retry",
            post(handlers::retry_pending_order),
        )
        // Raw body, verified before parsing
        .route("/payments/webhook", post(handlers::stripe_webhook));

    // Health route (no timeout - must always respond quickly)
    let health_routes = Router::new().route("/health", get(handlers::health));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .merge(series_routes)
        .merge(catalog_routes)
        .merge(order_routes)
        .merge(payment_routes)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let allow_origin = match origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %o, "Ignoring unusable CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(origins)
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
