//! Order handlers

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ticketdesk_payments::issuer::Recipient;
use ticketdesk_types::{encode_reference, IssuedTicket, LogicalOrder, PendingItem};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct OrderListResponse {
    pub data: Vec<LogicalOrder>,
}

/// Manually entered order for one ticket type
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub event_id: String,
    pub ticket_type_id: String,
    pub buyer_name: String,
    pub buyer_email: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub phone: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub data: Vec<IssuedTicket>,
}

/// GET /orders
///
/// One order per buyer and occurrence, rebuilt from issued tickets.
pub async fn list_orders(State(state): State<AppState>) -> ApiResult<Json<OrderListResponse>> {
    let data = state.orders.list_orders().await?;
    tracing::debug!(orders = data.len(), "Aggregated orders");
    Ok(Json(OrderListResponse { data }))
}

/// POST /orders
///
/// Issues `quantity` tickets directly, without payment. Any failed unit
/// fails the request; tickets already issued are logged.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<Json<CreateOrderResponse>> {
    if request.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be at least 1".to_string()));
    }
    if request.ticket_type_id.trim().is_empty() {
        return Err(ApiError::BadRequest("ticket_type_id is required".to_string()));
    }
    let reference = encode_reference(&request.buyer_name, &request.buyer_email)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let recipient = Recipient {
        event_id: &request.event_id,
        reference: &reference,
        phone: request.phone.as_deref(),
    };
    let item = PendingItem {
        ticket_type_id: request.ticket_type_id.clone(),
        quantity: request.quantity,
        issued: 0,
    };
    let mut report = state.issuer.issue(recipient, vec![item]).await;

    if !report.is_complete() {
        let issued: Vec<&str> = report.tickets.iter().map(|t| t.id.as_str()).collect();
        tracing::warn!(
            event_id = %request.event_id,
            ticket_type_id = %request.ticket_type_id,
            ?issued,
            requested = request.quantity,
            "Manual order incomplete"
        );
        return Err(match report.first_error.take() {
            Some(e) => e.into(),
            None => ApiError::BadRequest(report.error_text()),
        });
    }

    tracing::info!(
        event_id = %request.event_id,
        issued = report.tickets.len(),
        "Manual order issued"
    );
    Ok(Json(CreateOrderResponse {
        data: report.tickets,
    }))
}

/// GET /orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.orders.get_order(&order_id).await?))
}
