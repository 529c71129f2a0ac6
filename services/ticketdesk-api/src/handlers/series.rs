//! Event series, ticket group and bundle handlers

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use ticketdesk_provider::{BundleDraft, SeriesDraft, TicketGroupDraft};
use ticketdesk_types::BundleAvailability;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BundleAvailabilityResponse {
    pub data: Vec<BundleAvailability>,
}

pub async fn list_series(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.list_series().await?))
}

pub async fn get_series(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.get_series(&series_id).await?))
}

pub async fn create_series(
    State(state): State<AppState>,
    Json(draft): Json<SeriesDraft>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.create_series(&draft).await?))
}

pub async fn update_series(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
    Json(draft): Json<SeriesDraft>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.update_series(&series_id, &draft).await?))
}

pub async fn delete_series(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.delete_series(&series_id).await?))
}

/// POST /event_series/{id}/publish
///
/// Publishing an already published series succeeds.
pub async fn publish_series(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.publish_series(&series_id).await?))
}

/// POST /event_series/{id}/unpublish
pub async fn unpublish_series(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.unpublish_series(&series_id).await?))
}

pub async fn create_ticket_group(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
    Json(draft): Json<TicketGroupDraft>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.create_ticket_group(&series_id, &draft).await?))
}

pub async fn delete_ticket_group(
    State(state): State<AppState>,
    Path((series_id, group_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.delete_ticket_group(&series_id, &group_id).await?))
}

pub async fn list_bundles(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.list_bundles(&series_id).await?))
}

pub async fn create_bundle(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
    Json(draft): Json<BundleDraft>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.create_bundle(&series_id, &draft).await?))
}

pub async fn delete_bundle(
    State(state): State<AppState>,
    Path((series_id, bundle_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.catalog.delete_bundle(&series_id, &bundle_id).await?))
}

/// GET /event_series/{id}/bundles/availability
///
/// Bundles with how many can still be sold given current ticket stock.
pub async fn bundle_availability(
    State(state): State<AppState>,
    Path(series_id): Path<String>,
) -> ApiResult<Json<BundleAvailabilityResponse>> {
    let data = state.bundles.compute_availability(&series_id).await?;
    Ok(Json(BundleAvailabilityResponse { data }))
}
