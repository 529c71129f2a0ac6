//! Configuration for the Ticketdesk API service.

use std::path::PathBuf;
use std::time::Duration;

use ticketdesk_payments::notifier::{DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};
use ticketdesk_payments::pending::DEFAULT_PENDING_PATH;
use ticketdesk_payments::{PaymentsConfig, SmtpSettings};
use ticketdesk_provider::config::DEFAULT_PAGE_SIZE;
use ticketdesk_provider::ProviderConfig;

/// Placeholder marker left in unfilled `.env` templates
const PLACEHOLDER: &str = "REPLACE";

/// Ticketdesk API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Ticketing provider client configuration
    pub provider: ProviderConfig,
    /// Payment pipeline configuration
    pub payments: PaymentsConfig,
    /// Pending order store location
    pub pending_orders_path: PathBuf,
    /// SMTP relay; confirmations are only logged without it
    pub smtp: Option<SmtpSettings>,
    /// Allowed CORS origins; `None` allows any
    pub cors_origins: Option<Vec<String>>,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// Empty values and values still holding a `REPLACE` placeholder count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && !v.contains(PLACEHOLDER))
        };

        // Server
        let http_port = parse_or(&var, "HTTP_PORT", 8000)?;

        let request_timeout_secs: u64 = parse_or(&var, "REQUEST_TIMEOUT_SECS", 30)?;
        let request_timeout = Duration::from_secs(request_timeout_secs);

        // Ticketing provider
        let api_key = var("TICKET_TAILOR_API_KEY").ok_or(ConfigError::Missing("TICKET_TAILOR_API_KEY"))?;
        let page_size = parse_or(&var, "PROVIDER_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::Invalid("PROVIDER_PAGE_SIZE"));
        }

        let mut provider = ProviderConfig::new(api_key)
            .with_page_size(page_size)
            .with_timeout(request_timeout);
        if let Some(base_url) = var("TICKET_TAILOR_BASE_URL") {
            provider = provider.with_base_url(base_url);
        }

        // Stripe
        let platform_fee_percent: f64 = parse_or(&var, "PLATFORM_FEE_PERCENT", 10.0)?;
        if !(0.0..=100.0).contains(&platform_fee_percent) {
            return Err(ConfigError::Invalid("PLATFORM_FEE_PERCENT"));
        }

        let frontend_url =
            var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".to_string());
        let mut payments = PaymentsConfig::new(frontend_url).with_platform_fee(platform_fee_percent);
        if let Some(key) = var("STRIPE_SECRET_KEY") {
            payments = payments.with_secret_key(key);
        }
        if let Some(secret) = var("STRIPE_WEBHOOK_SECRET") {
            payments = payments.with_webhook_secret(secret);
        }
        if let Some(account) = var("STRIPE_CONNECTED_ACCOUNT") {
            payments = payments.with_connected_account(account);
        }

        let pending_orders_path = var("PENDING_ORDERS_PATH")
            .unwrap_or_else(|| DEFAULT_PENDING_PATH.to_string())
            .into();

        // Email
        let smtp = match (var("SMTP_EMAIL"), var("SMTP_APP_PASSWORD")) {
            (Some(username), Some(password)) => Some(SmtpSettings {
                host: var("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port: parse_or(&var, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
                username,
                password,
            }),
            _ => None,
        };

        let cors_origins = var("CORS_ORIGINS").and_then(|raw| {
            let origins: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            (!origins.iter().any(|o| o == "*") && !origins.is_empty()).then_some(origins)
        });

        // Metrics
        let metrics_enabled = var("METRICS_ENABLED")
            .map_or(Ok(true), |v| v.parse())
            .unwrap_or(true);

        Ok(Self {
            http_port,
            provider,
            payments,
            pending_orders_path,
            smtp,
            cors_origins,
            request_timeout,
            metrics_enabled,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(key).map_or(Ok(default), |raw| {
        raw.parse().map_err(|_| ConfigError::Invalid(key))
    })
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
