use crate::api::error::AppError;
use crate::entities::prelude::*;
use crate::services::matching::{self, ScoredMatch};
use axum::{
    Json,
    extract::{Path, State},
};
use sea_orm::EntityTrait;

#[utoipa::path(
    get,
    path = "/items/{id}/matches",
    params(("id" = String, Path, description = "Reference item id")),
    responses(
        (status = 200, description = "Ranked counterpart items"),
        (status = 404, description = "Item not found")
    ),
    tag = "matches"
)]
pub async fn get_item_matches(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ScoredMatch>>, AppError> {
    let base = Items::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

    let matches = matching::find_matches(
        &state.db,
        &base,
        state.config.match_radius_km,
        state.config.match_limit as usize,
    )
    .await?;

    Ok(Json(matches))
}
