use crate::api::error::AppError;
use crate::entities::{items, prelude::*};
use crate::services::ai_search::ExtractedFilters;
use axum::{Json, extract::State};
use sea_orm::{EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Result cap for the AI-assisted search, matching the match-list limit.
const AI_RESULT_LIMIT: u64 = 5;

#[derive(Deserialize, Validate, ToSchema)]
pub struct AiSearchRequest {
    #[validate(length(min = 1, message = "Query string is required"))]
    pub query: String,
}

#[derive(Serialize)]
pub struct AiSearchResponse {
    pub filters: ExtractedFilters,
    pub items: Vec<items::Model>,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/ai/search",
    request_body = AiSearchRequest,
    responses(
        (status = 200, description = "Extracted filters, matching items, and a summary"),
        (status = 400, description = "Missing query")
    ),
    tag = "ai"
)]
pub async fn search_items_ai(
    State(state): State<crate::AppState>,
    Json(payload): Json<AiSearchRequest>,
) -> Result<Json<AiSearchResponse>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Degrades internally: provider/parse failures yield fallback filters.
    let filters = state.ai.extract_filters(&payload.query).await;

    // City wins over the looser location string when both were extracted.
    let location = filters.city.as_deref().or(filters.location.as_deref());
    let cond = super::items::build_open_items_filter(
        filters.item_type.as_deref(),
        filters.category.as_deref(),
        filters.search.as_deref(),
        location,
    );

    let found = Items::find()
        .filter(cond)
        .order_by_desc(items::Column::CreatedAt)
        .limit(AI_RESULT_LIMIT)
        .all(&state.db)
        .await?;

    let listing: Vec<(String, String)> = found
        .iter()
        .map(|i| {
            let location = i
                .address
                .clone()
                .or_else(|| i.city.clone())
                .unwrap_or_else(|| i.area.clone());
            (i.title.clone(), location)
        })
        .collect();

    let message = state.ai.summarize(&payload.query, &listing).await;

    Ok(Json(AiSearchResponse {
        filters,
        items: found,
        message,
    }))
}
