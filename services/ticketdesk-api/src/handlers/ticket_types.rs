//! Ticket type handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use ticketdesk_provider::TicketTypeDraft;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub event_id: Option<String>,
}

/// GET /ticket_types?event_id=
///
/// Without `event_id`, ticket types across every occurrence, each listed once.
pub async fn list_ticket_types(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> ApiResult<Json<Value>> {
    let event_id = query.event_id.as_deref().filter(|id| !id.is_empty());
    Ok(Json(state.catalog.list_ticket_types(event_id).await?))
}

pub async fn create_ticket_type(
    State(state): State<AppState>,
    Json(draft): Json<TicketTypeDraft>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.create_ticket_type(&draft).await?))
}

/// DELETE /ticket_types/{id}?event_id=
pub async fn delete_ticket_type(
    State(state): State<AppState>,
    Path(ticket_type_id): Path<String>,
    Query(query): Query<EventQuery>,
) -> ApiResult<Json<Value>> {
    let event_id = query
        .event_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("event_id is required".to_string()))?;
    Ok(Json(
        state
            .catalog
            .delete_ticket_type(&ticket_type_id, &event_id)
            .await?,
    ))
}
