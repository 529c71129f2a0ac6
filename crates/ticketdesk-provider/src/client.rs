//! Ticketing provider REST client

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};

/// Form-encoded request body
pub type Form = Vec<(String, String)>;

/// Ticketing provider API
///
/// Abstracts the provider's REST surface so the aggregation, availability and
/// fulfillment logic can run against an in-memory provider in tests.
#[async_trait]
pub trait TicketingApi: Send + Sync {
    /// GET a resource or list
    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> ProviderResult<Value>;

    /// POST a form-encoded body
    async fn post(&self, endpoint: &str, form: &[(String, String)]) -> ProviderResult<Value>;

    /// Update a resource with a form-encoded body
    async fn put(&self, endpoint: &str, form: &[(String, String)]) -> ProviderResult<Value>;

    /// DELETE a resource
    async fn delete(&self, endpoint: &str) -> ProviderResult<Value>;
}

/// Decode a provider response into a typed record
pub fn decode<T: DeserializeOwned>(value: Value) -> ProviderResult<T> {
    serde_json::from_value(value).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// HTTP client for the ticketing provider
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    config: ProviderConfig,
}

impl ProviderClient {
    /// Create a new provider client
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Configured page size
    pub fn page_size(&self) -> u32 {
        self.config.page_size
    }

    /// Make authenticated request to the provider
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        form: Option<&[(String, String)]>,
    ) -> ProviderResult<Value> {
        let url = format!("{}{endpoint}", self.config.base_url);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.config.api_key, Option::<&str>::None)
            .header(reqwest::header::ACCEPT, "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(form_data) = form {
            request = request.form(form_data);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, endpoint = %endpoint, "Ticketing provider request failed");
            ProviderError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, endpoint = %endpoint, body = %body, "Ticketing provider error");
            return Err(ProviderError::from_response(status.as_u16(), &body));
        }

        let body = response.text().await.map_err(|e| {
            error!(error = %e, "Failed to read ticketing provider response");
            ProviderError::Transport(e.to_string())
        })?;

        // Deletes may come back with an empty body
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse ticketing provider response");
            ProviderError::Decode(e.to_string())
        })
    }
}

#[async_trait]
impl TicketingApi for ProviderClient {
    #[instrument(skip(self, query))]
    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> ProviderResult<Value> {
        debug!(?query, "GET");
        self.request(Method::GET, endpoint, query, None).await
    }

    #[instrument(skip(self, form))]
    async fn post(&self, endpoint: &str, form: &[(String, String)]) -> ProviderResult<Value> {
        debug!(fields = form.len(), "POST");
        self.request(Method::POST, endpoint, &[], Some(form)).await
    }

    /// The provider applies updates through POST on the entity URL.
    #[instrument(skip(self, form))]
    async fn put(&self, endpoint: &str, form: &[(String, String)]) -> ProviderResult<Value> {
        debug!(fields = form.len(), "UPDATE");
        self.request(Method::POST, endpoint, &[], Some(form)).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, endpoint: &str) -> ProviderResult<Value> {
        debug!("DELETE");
        self.request(Method::DELETE, endpoint, &[], None).await
    }
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Build a form from string pairs
pub fn form<K, V, I>(pairs: I) -> Form
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
