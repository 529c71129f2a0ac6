//! Checkout, free order, Stripe webhook and pending order handlers

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use ticketdesk_payments::{
    CheckoutOutcome, FreeOrderResult, PaymentError, PendingOrderList, RetryResult, WebhookOutcome,
};
use ticketdesk_types::{CheckoutRequest, FreeOrderRequest};

use crate::error::ApiResult;
use crate::state::AppState;

/// Stripe signature header
pub const STRIPE_SIGNATURE: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// POST /payments/create-checkout-session
///
/// Zero-total orders come back with `free: true` instead of a Stripe URL.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutOutcome>> {
    Ok(Json(state.payments.create_checkout_session(&request).await?))
}

/// POST /payments/create-free-order
pub async fn create_free_order(
    State(state): State<AppState>,
    Json(request): Json<FreeOrderRequest>,
) -> ApiResult<Json<FreeOrderResult>> {
    Ok(Json(state.payments.create_free_order(&request).await?))
}

/// POST /payments/webhook
///
/// Handle Stripe webhook events. The raw body is verified before parsing.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = match headers.get(STRIPE_SIGNATURE) {
        Some(value) => Some(value.to_str().map_err(|_| {
            tracing::warn!("Invalid Stripe-Signature header encoding");
            PaymentError::Webhook("invalid signature header".to_string())
        })?),
        None => None,
    };

    let outcome = state.payments.process_webhook(&body, signature).await?;
    match outcome {
        WebhookOutcome::Pending(pending_id) => {
            tracing::warn!(%pending_id, "Webhook left tickets owed");
        }
        WebhookOutcome::Unprocessable => {
            tracing::warn!("Webhook acknowledged without issuing");
        }
        _ => tracing::debug!(?outcome, "Webhook handled"),
    }

    Ok(Json(WebhookAck { received: true }))
}

/// GET /payments/pending-orders
pub async fn list_pending_orders(
    State(state): State<AppState>,
) -> ApiResult<Json<PendingOrderList>> {
    Ok(Json(state.payments.list_pending().await?))
}

/// POST /payments/pending-orders/{id}/retry
///
/// Issues only the tickets the order still owes.
pub async fn retry_pending_order(
    State(state): State<AppState>,
    Path(pending_id): Path<Uuid>,
) -> ApiResult<Json<RetryResult>> {
    Ok(Json(state.payments.retry_pending(pending_id).await?))
}
