//! Ticketing provider errors

use thiserror::Error;

/// Ticketing provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider rejected the request (4xx other than 404)
    #[error("ticketing provider rejected request [{status}]: {message}")]
    Rejected {
        /// HTTP status returned by the provider
        status: u16,
        /// The provider's own message
        message: String,
        /// The provider's machine-readable code, e.g. `VALIDATION_ERROR`
        error_code: Option<String>,
    },

    /// The referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider failed to handle the request (5xx)
    #[error("ticketing provider error [{status}]: {message}")]
    Upstream {
        /// HTTP status returned by the provider
        status: u16,
        /// The provider's own message
        message: String,
    },

    /// Network or timeout failure talking to the provider
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape
    #[error("unexpected provider response: {0}")]
    Decode(String),

    /// Request could not be built from the given input
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A discount was deleted during replace-on-update but the replacement
    /// could not be created. The original is gone and must be recreated by
    /// hand.
    #[error("discount {discount_id} was deleted but could not be recreated: {source}")]
    RecreateFailed {
        /// ID of the deleted discount
        discount_id: String,
        /// Why the replacement failed
        #[source]
        source: Box<ProviderError>,
    },

    /// Check-in was refused because the ticket was already scanned
    #[error("ticket is already checked in")]
    AlreadyCheckedIn,
}

impl ProviderError {
    /// Build an error from a non-success provider response.
    ///
    /// The provider's `message` (or `error`) field is preserved when the body
    /// is JSON; otherwise the raw body text is used.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();

        let message = parsed
            .as_ref()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .or_else(|| v.is_object().then(|| v.to_string()))
            })
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| format!("HTTP {status}"));

        let error_code = parsed
            .as_ref()
            .and_then(|v| v.get("error_code"))
            .and_then(|c| c.as_str())
            .map(str::to_string);

        match status {
            404 => Self::NotFound(message),
            400..=499 => Self::Rejected {
                status,
                message,
                error_code,
            },
            _ => Self::Upstream { status, message },
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the provider refused the request as invalid
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::AlreadyCheckedIn)
    }

    /// The provider's message, without the variant prefix
    pub fn provider_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } | Self::Upstream { message, .. } => message.clone(),
            Self::NotFound(m) | Self::Transport(m) | Self::Decode(m) | Self::InvalidRequest(m) => {
                m.clone()
            }
            Self::RecreateFailed { source, .. } => source.provider_message(),
            Self::AlreadyCheckedIn => self.to_string(),
        }
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;
