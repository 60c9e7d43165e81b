use crate::api::error::AppError;
use crate::entities::{item_votes, items, prelude::*, users};
use crate::services::notifier;
use crate::utils::geo;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    /// "lost" or "found".
    #[serde(rename = "type")]
    pub item_type: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub color: Option<String>,
    pub occurred_on: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub images: Vec<String>,
    #[validate(length(min = 1, message = "Area is required"))]
    pub area: String,
    pub address: Option<String>,
    pub city: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
    pub contact: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct ListItemsQuery {
    /// Filter by disposition ("lost" / "found").
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub category: Option<String>,
    /// Free-text match against title and description.
    pub search: Option<String>,
    /// Free-text match against area, address and city.
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Radius in km for lat/lng proximity filtering.
    pub radius: Option<f64>,
    /// Bounding box "min_lng,min_lat,max_lng,max_lat".
    #[serde(rename = "box")]
    pub bounding_box: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct VoteRequest {
    /// "up", "down" or "none" (retract).
    pub direction: String,
}

#[derive(Serialize, ToSchema)]
pub struct VoteResponse {
    pub upvotes: u64,
    pub downvotes: u64,
    pub my_vote: Option<String>,
}

#[derive(Serialize)]
pub struct PosterInfo {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct ItemDetailResponse {
    #[serde(flatten)]
    pub item: items::Model,
    pub user: Option<PosterInfo>,
    pub upvotes: u64,
    pub downvotes: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Case-insensitive LIKE across backends.
fn ilike(col: items::Column, needle: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(col))).like(format!("%{}%", needle.to_lowercase()))
}

fn parse_bounding_box(raw: &str) -> Result<(f64, f64, f64, f64), AppError> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| AppError::BadRequest("Malformed bounding box".to_string()))?;
    if parts.len() != 4 {
        return Err(AppError::BadRequest(
            "Bounding box must be min_lng,min_lat,max_lng,max_lat".to_string(),
        ));
    }
    Ok((parts[0], parts[1], parts[2], parts[3]))
}

/// Build the open-item listing filter shared by REST search and AI search.
pub fn build_open_items_filter(
    item_type: Option<&str>,
    category: Option<&str>,
    search: Option<&str>,
    location: Option<&str>,
) -> Condition {
    let mut cond = Condition::all().add(items::Column::Status.eq(items::ItemStatus::Open.as_str()));

    if let Some(t) = item_type {
        cond = cond.add(items::Column::ItemType.eq(t));
    }
    if let Some(c) = category {
        cond = cond.add(items::Column::Category.eq(c));
    }
    if let Some(s) = search {
        cond = cond.add(
            Condition::any()
                .add(ilike(items::Column::Title, s))
                .add(ilike(items::Column::Description, s)),
        );
    }
    if let Some(l) = location {
        cond = cond.add(
            Condition::any()
                .add(ilike(items::Column::Area, l))
                .add(ilike(items::Column::Address, l))
                .add(ilike(items::Column::City, l)),
        );
    }

    cond
}

#[utoipa::path(
    post,
    path = "/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created"),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "items"
)]
pub async fn create_item(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<items::Model>), AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if payload.item_type != items::TYPE_LOST && payload.item_type != items::TYPE_FOUND {
        return Err(AppError::BadRequest(
            "type must be 'lost' or 'found'".to_string(),
        ));
    }

    let now = Utc::now();
    let item = items::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        item_type: Set(payload.item_type),
        title: Set(payload.title),
        description: Set(payload.description),
        category: Set(payload.category),
        color: Set(payload.color),
        occurred_on: Set(payload.occurred_on),
        images: Set(serde_json::json!(payload.images)),
        area: Set(payload.area),
        address: Set(payload.address),
        city: Set(payload.city),
        lat: Set(payload.lat),
        lng: Set(payload.lng),
        status: Set(items::ItemStatus::Open.as_str().to_string()),
        user_id: Set(user.id.clone()),
        contact: Set(payload.contact),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    // Detached from this request: failures in the notification path must
    // never reach the creator or undo the insert.
    notifier::spawn_match_notifications(
        state.db.clone(),
        state.mailer.clone(),
        state.config.clone(),
        item.clone(),
    );

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/items",
    params(ListItemsQuery),
    responses(
        (status = 200, description = "Open items, newest first")
    ),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<crate::AppState>,
    Query(query): Query<ListItemsQuery>,
) -> Result<Json<Vec<items::Model>>, AppError> {
    let mut cond = build_open_items_filter(
        query.item_type.as_deref(),
        query.category.as_deref(),
        query.search.as_deref(),
        query.location.as_deref(),
    );

    if let Some(raw) = query.bounding_box.as_deref() {
        let (min_lng, min_lat, max_lng, max_lat) = parse_bounding_box(raw)?;
        cond = cond
            .add(items::Column::Lat.gte(min_lat))
            .add(items::Column::Lat.lte(max_lat))
            .add(items::Column::Lng.gte(min_lng))
            .add(items::Column::Lng.lte(max_lng));
    }

    let mut results = Items::find()
        .filter(cond)
        .order_by_desc(items::Column::CreatedAt)
        .all(&state.db)
        .await?;

    // Proximity is a post-filter; the document-store geo index this
    // replaces did the same containment test server-side.
    if let (Some(lat), Some(lng)) = (query.lat, query.lng) {
        let radius = query.radius.unwrap_or(state.config.match_radius_km);
        results.retain(|item| match (item.lat, item.lng) {
            (Some(ilat), Some(ilng)) => geo::within_radius_km(lat, lng, ilat, ilng, radius),
            _ => false,
        });
    }

    Ok(Json(results))
}

#[utoipa::path(
    get,
    path = "/items/user/me",
    responses(
        (status = 200, description = "Caller's own items"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "items"
)]
pub async fn get_my_items(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
) -> Result<Json<Vec<items::Model>>, AppError> {
    let results = Items::find()
        .filter(items::Column::UserId.eq(&user.id))
        .order_by_desc(items::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(results))
}

async fn vote_counts(
    db: &sea_orm::DatabaseConnection,
    item_id: &str,
) -> Result<(u64, u64), AppError> {
    let upvotes = ItemVotes::find()
        .filter(item_votes::Column::ItemId.eq(item_id))
        .filter(item_votes::Column::Vote.eq("up"))
        .count(db)
        .await?;
    let downvotes = ItemVotes::find()
        .filter(item_votes::Column::ItemId.eq(item_id))
        .filter(item_votes::Column::Vote.eq("down"))
        .count(db)
        .await?;
    Ok((upvotes, downvotes))
}

#[utoipa::path(
    get,
    path = "/items/{id}",
    params(("id" = String, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item detail"),
        (status = 404, description = "Item not found")
    ),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemDetailResponse>, AppError> {
    let item = Items::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

    let poster = Users::find_by_id(&item.user_id)
        .one(&state.db)
        .await?
        .map(|u| PosterInfo {
            id: u.id,
            name: u.name,
            email: u.email,
        });

    let (upvotes, downvotes) = vote_counts(&state.db, &item.id).await?;

    Ok(Json(ItemDetailResponse {
        item,
        user: poster,
        upvotes,
        downvotes,
    }))
}

#[utoipa::path(
    delete,
    path = "/items/{id}",
    params(("id" = String, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Item not found")
    ),
    security(("jwt" = [])),
    tag = "items"
)]
pub async fn delete_item(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let item = Items::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

    if item.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the owner can delete this item".to_string(),
        ));
    }

    item.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "message": "Item removed" })))
}

#[utoipa::path(
    put,
    path = "/items/{id}/status",
    params(("id" = String, Path, description = "Item id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Unknown status or illegal transition"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Item not found")
    ),
    security(("jwt" = [])),
    tag = "items"
)]
pub async fn update_status(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<items::Model>, AppError> {
    let item = Items::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

    if item.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the owner can update this item".to_string(),
        ));
    }

    let next = items::ItemStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest("Unknown status".to_string()))?;
    let current = items::ItemStatus::parse(&item.status)
        .ok_or_else(|| AppError::Internal(format!("invalid item status: {}", item.status)))?;

    if !current.can_advance_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move item from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    if next == current {
        return Ok(Json(item));
    }

    let mut active: items::ActiveModel = item.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now());
    let item = active.update(&state.db).await?;

    Ok(Json(item))
}

#[utoipa::path(
    post,
    path = "/items/{id}/vote",
    params(("id" = String, Path, description = "Item id")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = VoteResponse),
        (status = 400, description = "Unknown direction"),
        (status = 404, description = "Item not found")
    ),
    security(("jwt" = [])),
    tag = "items"
)]
pub async fn vote_item(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    Items::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

    match payload.direction.as_str() {
        "none" => {
            // Retract: idempotent delete of the (item, user) row.
            ItemVotes::delete_many()
                .filter(item_votes::Column::ItemId.eq(&id))
                .filter(item_votes::Column::UserId.eq(&user.id))
                .exec(&state.db)
                .await?;
        }
        "up" | "down" => {
            // One row per (item, user): an upsert flips the direction, so
            // up/down can never coexist for the same voter.
            let vote = item_votes::ActiveModel {
                item_id: Set(id.clone()),
                user_id: Set(user.id.clone()),
                vote: Set(payload.direction.clone()),
                created_at: Set(Utc::now()),
            };
            ItemVotes::insert(vote)
                .on_conflict(
                    OnConflict::columns([item_votes::Column::ItemId, item_votes::Column::UserId])
                        .update_column(item_votes::Column::Vote)
                        .to_owned(),
                )
                .exec(&state.db)
                .await?;
        }
        _ => {
            return Err(AppError::BadRequest(
                "direction must be 'up', 'down' or 'none'".to_string(),
            ));
        }
    }

    let (upvotes, downvotes) = vote_counts(&state.db, &id).await?;
    let my_vote = ItemVotes::find()
        .filter(item_votes::Column::ItemId.eq(&id))
        .filter(item_votes::Column::UserId.eq(&user.id))
        .one(&state.db)
        .await?
        .map(|v| v.vote);

    Ok(Json(VoteResponse {
        upvotes,
        downvotes,
        my_vote,
    }))
}
