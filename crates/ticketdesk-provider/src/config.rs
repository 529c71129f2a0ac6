//! Ticketing provider configuration

use std::time::Duration;

/// Default Ticket Tailor API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.tickettailor.com/v1";

/// Default page size when listing issued tickets
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Ticketing provider configuration
#[derive(Clone)]
pub struct ProviderConfig {
    /// API key, sent as the basic-auth username
    pub api_key: String,
    /// API base URL without trailing slash
    pub base_url: String,
    /// Page size for cursor pagination
    pub page_size: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// Create a new provider config
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the page size (clamped to at least 1)
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
