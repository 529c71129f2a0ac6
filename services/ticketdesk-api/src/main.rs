//! Ticketdesk API server

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ticketdesk_api::{build_router, AppState, Config};
use ticketdesk_payments::metrics::{describe_metrics, OPERATION_DURATION_SECONDS};
use ticketdesk_payments::{
    FulfillmentService, JsonFileStore, LogNotifier, Notifier, SmtpNotifier,
};
use ticketdesk_provider::{ProviderClient, TicketingApi};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("ticketdesk_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Ticketdesk API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        stripe = config.payments.stripe_secret_key.is_some(),
        webhook_verification = config.payments.stripe_webhook_secret.is_some(),
        email = config.smtp.is_some(),
        "Configuration loaded"
    );
    if config.payments.stripe_webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set; webhook signatures will not be checked");
    }

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Ticketing provider client, shared by every service
    let api: Arc<dyn TicketingApi> = Arc::new(ProviderClient::new(config.provider.clone())?);

    let store = Arc::new(JsonFileStore::new(config.pending_orders_path.clone()));
    tracing::info!(path = %config.pending_orders_path.display(), "Pending order store ready");

    let notifier: Arc<dyn Notifier> = match config.smtp.clone() {
        Some(settings) => Arc::new(SmtpNotifier::new(settings)?),
        None => {
            tracing::warn!("SMTP credentials not set; confirmations will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let payments = FulfillmentService::new(config.payments.clone(), Arc::clone(&api), store, notifier);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = AppState::new(api, payments, config);
    let app = build_router(state, metrics_handle);

    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Issuance makes one provider call per ticket, so allow for slow tails
    let operation_buckets = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(OPERATION_DURATION_SECONDS.to_string()),
            operation_buckets,
        )?
        .install_recorder()?;

    describe_metrics();

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
