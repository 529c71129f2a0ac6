//! Door scanner handlers

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ticketdesk_types::IssuedTicket;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub ticket_id: String,
}

#[derive(Serialize)]
pub struct CheckInResponse {
    pub success: bool,
    pub data: Value,
}

/// POST /check_ins
pub async fn create_check_in(
    State(state): State<AppState>,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<Json<CheckInResponse>> {
    let data = state.check_ins.check_in(request.ticket_id.trim()).await?;
    Ok(Json(CheckInResponse {
        success: true,
        data,
    }))
}

/// GET /check_ins/{ticket_id}
///
/// Accepts an issued-ticket ID or a barcode.
pub async fn lookup_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<Json<IssuedTicket>> {
    Ok(Json(state.check_ins.lookup(ticket_id.trim()).await?))
}
