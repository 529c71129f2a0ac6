//! Payment pipeline configuration

/// Default Stripe API base URL
pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Payment pipeline configuration
#[derive(Clone)]
pub struct PaymentsConfig {
    /// Stripe secret key; paid checkout is unavailable without it
    pub stripe_secret_key: Option<String>,
    /// Stripe webhook signing secret; signatures are not checked without it
    pub stripe_webhook_secret: Option<String>,
    /// Connected account receiving the merchant share
    pub connected_account: Option<String>,
    /// Platform share of each paid order, in percent
    pub platform_fee_percent: f64,
    /// Frontend base URL for checkout redirects
    pub frontend_url: String,
    /// Stripe API base URL
    pub stripe_api_base: String,
}

impl PaymentsConfig {
    /// Create a config with no Stripe credentials
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            connected_account: None,
            platform_fee_percent: 10.0,
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
            stripe_api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Set the Stripe secret key
    pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
        self.stripe_secret_key = Some(key.into());
        self
    }

    /// Set the webhook signing secret
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.stripe_webhook_secret = Some(secret.into());
        self
    }

    /// Set the connected account
    pub fn with_connected_account(mut self, account: impl Into<String>) -> Self {
        self.connected_account = Some(account.into());
        self
    }

    /// Set the platform fee percentage
    pub fn with_platform_fee(mut self, percent: f64) -> Self {
        self.platform_fee_percent = percent;
        self
    }

    /// Override the Stripe API base URL
    pub fn with_stripe_api_base(mut self, base: impl Into<String>) -> Self {
        self.stripe_api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Checkout success redirect; Stripe substitutes the session ID
    pub fn success_url(&self) -> String {
        format!("{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}", self.frontend_url)
    }

    /// Checkout cancel redirect
    pub fn cancel_url(&self) -> String {
        format!("{}/payment/cancel", self.frontend_url)
    }

    /// Where free orders are sent instead of Stripe
    pub fn free_success_url(&self) -> String {
        format!("{}/payment/success?free=true", self.frontend_url)
    }
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("stripe_secret_key", &self.stripe_secret_key.as_ref().map(|_| "***"))
            .field("stripe_webhook_secret", &self.stripe_webhook_secret.as_ref().map(|_| "***"))
            .field("connected_account", &self.connected_account)
            .field("platform_fee_percent", &self.platform_fee_percent)
            .field("frontend_url", &self.frontend_url)
            .finish_non_exhaustive()
    }
}

/// Platform fee for a paid total, rounded up to the next minor unit.
///
/// The percentage is applied at basis-point resolution so the result is
/// exact integer arithmetic.
pub fn application_fee(total: i64, percent: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let basis_points = (percent * 100.0).round() as i64;
    let scaled = total.saturating_mul(basis_points.max(0));
    (scaled + 9_999).div_euclid(10_000)
}
