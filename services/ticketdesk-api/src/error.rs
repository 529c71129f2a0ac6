//! Error types for the Ticketdesk API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use ticketdesk_payments::PaymentError;
use ticketdesk_provider::ProviderError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Payment(#[from] PaymentError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Provider(e) => provider_status(e),
            Self::Payment(e) => match e {
                PaymentError::Rejected(_) | PaymentError::Webhook(_) => StatusCode::BAD_REQUEST,
                PaymentError::PendingOrderNotFound(_) => StatusCode::NOT_FOUND,
                PaymentError::RetryInProgress(_) => StatusCode::CONFLICT,
                PaymentError::PartialFulfillment { .. } | PaymentError::Transport(_) => {
                    StatusCode::BAD_GATEWAY
                }
                PaymentError::Configuration(_) | PaymentError::Store(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                PaymentError::Provider(e) => provider_status(e),
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Provider(e) | Self::Payment(PaymentError::Provider(e)) => provider_code(e),
            Self::Payment(e) => match e {
                PaymentError::Rejected(_) => "PAYMENT_REJECTED",
                PaymentError::Configuration(_) => "CONFIGURATION_ERROR",
                PaymentError::PendingOrderNotFound(_) => "PENDING_ORDER_NOT_FOUND",
                PaymentError::PartialFulfillment { .. } => "PARTIAL_FULFILLMENT",
                PaymentError::Transport(_) => "PAYMENT_PROVIDER_UNAVAILABLE",
                PaymentError::Webhook(_) => "WEBHOOK_ERROR",
                PaymentError::RetryInProgress(_) => "RETRY_IN_PROGRESS",
                PaymentError::Store(_) => "STORE_ERROR",
                PaymentError::Provider(e) => provider_code(e),
            },
        }
    }

    /// Message shown to the client. Provider errors carry the provider's own
    /// wording.
    fn message(&self) -> String {
        match self {
            Self::Provider(e) | Self::Payment(PaymentError::Provider(e)) => match e {
                ProviderError::RecreateFailed { .. } | ProviderError::AlreadyCheckedIn => e.to_string(),
                _ => e.provider_message(),
            },
            _ => self.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Payment(PaymentError::PartialFulfillment {
                pending_id,
                issued,
                requested,
                ..
            }) => Some(json!({
                "pending_id": pending_id,
                "issued": issued,
                "requested": requested,
            })),
            Self::Provider(ProviderError::RecreateFailed { discount_id, .. }) => {
                Some(json!({ "discount_id": discount_id }))
            }
            _ => None,
        }
    }
}

fn provider_status(error: &ProviderError) -> StatusCode {
    match error {
        ProviderError::Rejected { .. }
        | ProviderError::InvalidRequest(_)
        | ProviderError::AlreadyCheckedIn => StatusCode::BAD_REQUEST,
        ProviderError::NotFound(_) => StatusCode::NOT_FOUND,
        ProviderError::Upstream { .. }
        | ProviderError::Transport(_)
        | ProviderError::Decode(_)
        | ProviderError::RecreateFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn provider_code(error: &ProviderError) -> &'static str {
    match error {
        ProviderError::Rejected { .. } => "UPSTREAM_VALIDATION_ERROR",
        ProviderError::InvalidRequest(_) => "BAD_REQUEST",
        ProviderError::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
        ProviderError::NotFound(_) => "NOT_FOUND",
        ProviderError::Upstream { .. } => "UPSTREAM_ERROR",
        ProviderError::Transport(_) => "UPSTREAM_UNAVAILABLE",
        ProviderError::Decode(_) => "UPSTREAM_DECODE_ERROR",
        ProviderError::RecreateFailed { .. } => "DISCOUNT_RECREATE_FAILED",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, code, "API error");
        } else {
            tracing::debug!(error = %self, code, "Request refused");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.message(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_provider_errors_map_to_status() {
        let rejected = ApiError::from(ProviderError::from_response(400, r#"{"message":"Bad date"}"#));
        assert_eq!(rejected.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(rejected.message(), "Bad date");

        let missing = ApiError::from(ProviderError::NotFound("ev_9".to_string()));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let down = ApiError::from(ProviderError::Transport("timed out".to_string()));
        assert_eq!(down.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_recreate_failure_has_its_own_code() {
        let err = ApiError::from(ProviderError::RecreateFailed {
            discount_id: "disc_1".to_string(),
            source: Box::new(ProviderError::Transport("reset".to_string())),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_code(), "DISCOUNT_RECREATE_FAILED");
        assert_eq!(err.details().unwrap()["discount_id"], "disc_1");
    }

    #[test]
    fn test_payment_errors_map_to_status() {
        let id = Uuid::new_v4();
        let cases = [
            (PaymentError::Rejected("No valid ticket items selected.".into()), StatusCode::BAD_REQUEST),
            (PaymentError::Configuration("Stripe is not configured"), StatusCode::INTERNAL_SERVER_ERROR),
            (PaymentError::PendingOrderNotFound(id), StatusCode::NOT_FOUND),
            (PaymentError::RetryInProgress(id), StatusCode::CONFLICT),
            (PaymentError::Webhook("bad signature".into()), StatusCode::BAD_REQUEST),
            (PaymentError::Store("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                PaymentError::Provider(ProviderError::NotFound("ev_1".into())),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status_code(), status);
        }
    }

    #[test]
    fn test_partial_fulfillment_reports_progress() {
        let id = Uuid::new_v4();
        let err = ApiError::from(PaymentError::PartialFulfillment {
            pending_id: id,
            issued: 1,
            requested: 3,
            message: "tt_a: sold out".to_string(),
        });

        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        let details = err.details().unwrap();
        assert_eq!(details["pending_id"], id.to_string());
        assert_eq!(details["issued"], 1);
        assert_eq!(details["requested"], 3);
    }
}
