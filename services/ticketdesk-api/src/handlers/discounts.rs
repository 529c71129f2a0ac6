//! Discount code handlers

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use ticketdesk_types::{DiscountDraft, DiscountPatch};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_discounts(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.discounts.list().await?))
}

pub async fn create_discount(
    State(state): State<AppState>,
    Json(draft): Json<DiscountDraft>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.discounts.create(&draft).await?))
}

/// PUT /discounts/{id}
///
/// The provider cannot edit discounts, so this replaces it. The response is
/// the replacement, which has a new ID.
pub async fn update_discount(
    State(state): State<AppState>,
    Path(discount_id): Path<String>,
    Json(patch): Json<DiscountPatch>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.discounts.update(&discount_id, &patch).await?))
}

pub async fn delete_discount(
    State(state): State<AppState>,
    Path(discount_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.discounts.delete(&discount_id).await?))
}
