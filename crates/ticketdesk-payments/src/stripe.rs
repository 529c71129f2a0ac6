//! Stripe payment provider implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::config::STRIPE_API_BASE;
use crate::error::{PaymentError, PaymentResult};
use crate::provider::{CheckoutSession, PaymentProvider, SessionRequest};

/// Stripe payment provider
#[derive(Clone)]
pub struct StripeProvider {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl StripeProvider {
    /// Create a new Stripe provider
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.into(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Point at a different API base (used against mock servers)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Make authenticated request to Stripe
    async fn stripe_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        form: Option<&[(String, String)]>,
    ) -> PaymentResult<T> {
        let url = format!("{}{endpoint}", self.api_base);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.secret_key, Option::<&str>::None);

        if let Some(form_data) = form {
            request = request.form(form_data);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Stripe API request failed");
            PaymentError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Stripe API error");
            let message = stripe_error_message(&error_body).unwrap_or_else(|| status.to_string());
            return Err(if status.is_client_error() {
                PaymentError::Rejected(format!("Stripe error: {message}"))
            } else {
                PaymentError::Transport(format!("Stripe error: {message}"))
            });
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            PaymentError::Transport(e.to_string())
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    #[instrument(skip(self, request), fields(lines = request.lines.len(), fee = request.application_fee_amount))]
    async fn create_checkout_session(
        &self,
        request: &SessionRequest,
    ) -> PaymentResult<CheckoutSession> {
        debug!(destination = %request.destination, "Creating checkout session");

        let form = session_form(request);
        let session: StripeCheckoutSession = self
            .stripe_request(reqwest::Method::POST, "/checkout/sessions", Some(&form))
            .await?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }
}

impl std::fmt::Debug for StripeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeProvider")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

/// Form body for a destination-charge checkout session
pub fn session_form(request: &SessionRequest) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("payment_method_types[0]".into(), "card".into()),
        ("customer_email".into(), request.customer_email.clone()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
        ("billing_address_collection".into(), "auto".into()),
        (
            "payment_intent_data[application_fee_amount]".into(),
            request.application_fee_amount.to_string(),
        ),
        (
            "payment_intent_data[transfer_data][destination]".into(),
            request.destination.clone(),
        ),
    ];

    for (i, line) in request.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.extend([
            (format!("{prefix}[price_data][currency]"), request.currency.clone()),
            (format!("{prefix}[price_data][product_data][name]"), line.name.clone()),
            (
                format!("{prefix}[price_data][product_data][description]"),
                line.description.clone(),
            ),
            (format!("{prefix}[price_data][unit_amount]"), line.unit_amount.to_string()),
            (format!("{prefix}[quantity]"), line.quantity.to_string()),
        ]);
    }

    for (key, value) in &request.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }

    form
}

fn stripe_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

// Stripe API response types

/// Stripe checkout session
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    /// Session ID
    pub id: String,
    /// Checkout URL
    pub url: Option<String>,
}
