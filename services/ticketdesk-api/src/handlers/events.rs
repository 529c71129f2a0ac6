//! Event occurrence handlers

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use ticketdesk_provider::{EventDraft, EventTickets};

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /events
pub async fn list_events(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.list_events().await?))
}

/// GET /events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.get_event(&event_id).await?))
}

/// POST /events
///
/// Creates the parent series too when the draft names none.
pub async fn create_event(
    State(state): State<AppState>,
    Json(draft): Json<EventDraft>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.create_event(&draft).await?))
}

/// PUT /events/{id}
pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(draft): Json<EventDraft>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.update_event(&event_id, &draft).await?))
}

/// DELETE /events/{id}
pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.delete_event(&event_id).await?))
}

/// GET /events/{id}/tickets
pub async fn event_tickets(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<EventTickets>> {
    Ok(Json(state.catalog.event_tickets(&event_id).await?))
}
