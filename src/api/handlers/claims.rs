use crate::api::error::AppError;
use crate::entities::{claims, items, prelude::*, users};
use crate::services::claims::{self as claim_rules, ClaimStatus};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateClaimRequest {
    pub item_id: String,
    /// Free-text proof of ownership.
    pub message: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateClaimStatusRequest {
    /// "approved" or "rejected".
    pub status: String,
    /// Optional reviewer response shown to the claimant.
    pub response: Option<String>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct UpdateClaimMessageRequest {
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
}

async fn load_claim(
    db: &sea_orm::DatabaseConnection,
    id: &str,
) -> Result<claims::Model, AppError> {
    Claims::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Claim not found".to_string()))
}

async fn load_item(
    db: &sea_orm::DatabaseConnection,
    id: &str,
) -> Result<items::Model, AppError> {
    Items::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))
}

#[utoipa::path(
    post,
    path = "/claims",
    request_body = CreateClaimRequest,
    responses(
        (status = 201, description = "Claim created"),
        (status = 400, description = "Duplicate claim or item not claimable"),
        (status = 404, description = "Item not found")
    ),
    security(("jwt" = [])),
    tag = "claims"
)]
pub async fn create_claim(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Json(payload): Json<CreateClaimRequest>,
) -> Result<(StatusCode, Json<claims::Model>), AppError> {
    let item = load_item(&state.db, &payload.item_id).await?;

    let status = items::ItemStatus::parse(&item.status)
        .ok_or_else(|| AppError::Internal(format!("invalid item status: {}", item.status)))?;
    if status.is_terminal() {
        return Err(AppError::BadRequest(
            "Item is no longer open for claims".to_string(),
        ));
    }

    // The unique index on (item_id, claimant_id) makes this insert the
    // arbiter: a concurrent duplicate loses with a constraint violation
    // instead of slipping past a lookup.
    let now = Utc::now();
    let claim = claims::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        item_id: Set(item.id.clone()),
        claimant_id: Set(user.id.clone()),
        status: Set(ClaimStatus::Pending.as_str().to_string()),
        message: Set(payload.message),
        response: Set(None),
        resolved_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, "You have already claimed this item"))?;

    Ok((StatusCode::CREATED, Json(claim)))
}

#[utoipa::path(
    get,
    path = "/claims",
    responses(
        (status = 200, description = "Claims visible to the caller"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "claims"
)]
pub async fn list_claims(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
) -> Result<Json<Vec<claims::Model>>, AppError> {
    // Reviewer-scoped: admins see everything, everyone else sees only
    // claims filed against their own items.
    let mut select = Claims::find().order_by_desc(claims::Column::CreatedAt);

    if !user.is_admin() {
        let my_item_ids: Vec<String> = Items::find()
            .filter(items::Column::UserId.eq(&user.id))
            .select_only()
            .column(items::Column::Id)
            .into_tuple()
            .all(&state.db)
            .await?;

        if my_item_ids.is_empty() {
            return Ok(Json(Vec::new()));
        }
        select = select.filter(claims::Column::ItemId.is_in(my_item_ids));
    }

    Ok(Json(select.all(&state.db).await?))
}

#[utoipa::path(
    get,
    path = "/claims/user/me",
    responses(
        (status = 200, description = "Caller's own claims"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "claims"
)]
pub async fn get_my_claims(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
) -> Result<Json<Vec<claims::Model>>, AppError> {
    let result = Claims::find()
        .filter(claims::Column::ClaimantId.eq(&user.id))
        .order_by_desc(claims::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/claims/item/{item_id}",
    params(("item_id" = String, Path, description = "Item id")),
    responses(
        (status = 200, description = "Claims against one item"),
        (status = 403, description = "Not the item owner"),
        (status = 404, description = "Item not found")
    ),
    security(("jwt" = [])),
    tag = "claims"
)]
pub async fn get_claims_by_item(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(item_id): Path<String>,
) -> Result<Json<Vec<claims::Model>>, AppError> {
    let item = load_item(&state.db, &item_id).await?;

    if item.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the item owner can review its claims".to_string(),
        ));
    }

    let result = Claims::find()
        .filter(claims::Column::ItemId.eq(&item.id))
        .order_by_desc(claims::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(result))
}

/// Advance the referenced item to `claimed`. A no-op when the item is
/// already claimed, so re-approval never errors.
async fn cascade_item_claimed(
    db: &sea_orm::DatabaseConnection,
    item_id: &str,
) -> Result<(), AppError> {
    let Some(item) = Items::find_by_id(item_id).one(db).await? else {
        // Item deleted since the claim was filed; nothing to advance.
        return Ok(());
    };

    let current = items::ItemStatus::parse(&item.status)
        .ok_or_else(|| AppError::Internal(format!("invalid item status: {}", item.status)))?;
    if current == items::ItemStatus::Claimed {
        return Ok(());
    }
    if !current.can_advance_to(items::ItemStatus::Claimed) {
        // Already resolved/retrieved by another path; leave it be.
        return Ok(());
    }

    let mut active: items::ActiveModel = item.into();
    active.status = Set(items::ItemStatus::Claimed.as_str().to_string());
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(())
}

#[utoipa::path(
    put,
    path = "/claims/{id}",
    params(("id" = String, Path, description = "Claim id")),
    request_body = UpdateClaimStatusRequest,
    responses(
        (status = 200, description = "Claim status updated"),
        (status = 400, description = "Illegal transition"),
        (status = 403, description = "Caller may not review this claim"),
        (status = 404, description = "Claim not found")
    ),
    security(("jwt" = [])),
    tag = "claims"
)]
pub async fn update_claim_status(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateClaimStatusRequest>,
) -> Result<Json<claims::Model>, AppError> {
    let claim = load_claim(&state.db, &id).await?;
    let item = load_item(&state.db, &claim.item_id).await?;

    // Reviewer = item owner or admin.
    if item.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the item owner or an admin can review this claim".to_string(),
        ));
    }

    let next = ClaimStatus::parse(&payload.status)
        .filter(|s| matches!(s, ClaimStatus::Approved | ClaimStatus::Rejected))
        .ok_or_else(|| AppError::BadRequest("status must be 'approved' or 'rejected'".to_string()))?;

    let current = claim_rules::parse_stored_status(&claim.status)?;
    if current == next {
        // Re-applying the same decision is a no-op, not an error.
        return Ok(Json(claim));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move claim from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    let mut active: claims::ActiveModel = claim.into();
    active.status = Set(next.as_str().to_string());
    active.response = Set(payload.response);
    active.resolved_at = Set(Some(Utc::now()));
    active.updated_at = Set(Utc::now());
    let claim = active.update(&state.db).await?;

    if next == ClaimStatus::Approved {
        cascade_item_claimed(&state.db, &claim.item_id).await?;
    }

    Ok(Json(claim))
}

#[utoipa::path(
    put,
    path = "/claims/{id}/resolve",
    params(("id" = String, Path, description = "Claim id")),
    responses(
        (status = 200, description = "Claim marked completed"),
        (status = 400, description = "Claim is not approved"),
        (status = 403, description = "Caller is not involved in this claim"),
        (status = 404, description = "Claim not found")
    ),
    security(("jwt" = [])),
    tag = "claims"
)]
pub async fn resolve_claim(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
) -> Result<Json<claims::Model>, AppError> {
    let claim = load_claim(&state.db, &id).await?;
    let item = load_item(&state.db, &claim.item_id).await?;

    let involved =
        claim.claimant_id == user.id || item.user_id == user.id || user.is_admin();
    if !involved {
        return Err(AppError::Forbidden(
            "Only the claimant, item owner or an admin can resolve this claim".to_string(),
        ));
    }

    let current = claim_rules::parse_stored_status(&claim.status)?;
    if !current.can_transition_to(ClaimStatus::Completed) {
        return Err(AppError::BadRequest(
            "Only an approved claim can be completed".to_string(),
        ));
    }

    let mut active: claims::ActiveModel = claim.into();
    active.status = Set(ClaimStatus::Completed.as_str().to_string());
    active.updated_at = Set(Utc::now());
    let claim = active.update(&state.db).await?;

    Ok(Json(claim))
}

#[utoipa::path(
    put,
    path = "/claims/{id}/message",
    params(("id" = String, Path, description = "Claim id")),
    request_body = UpdateClaimMessageRequest,
    responses(
        (status = 200, description = "Claim message updated"),
        (status = 400, description = "Claim is no longer pending"),
        (status = 403, description = "Caller is not the claimant"),
        (status = 404, description = "Claim not found")
    ),
    security(("jwt" = [])),
    tag = "claims"
)]
pub async fn update_claim_message(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateClaimMessageRequest>,
) -> Result<Json<claims::Model>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let claim = load_claim(&state.db, &id).await?;
    let current = claim_rules::parse_stored_status(&claim.status)?;
    claim_rules::check_claimant_mutation(current, &claim.claimant_id, &user.id)?;

    let mut active: claims::ActiveModel = claim.into();
    active.message = Set(Some(payload.message));
    active.updated_at = Set(Utc::now());
    let claim = active.update(&state.db).await?;

    Ok(Json(claim))
}

#[utoipa::path(
    delete,
    path = "/claims/{id}",
    params(("id" = String, Path, description = "Claim id")),
    responses(
        (status = 200, description = "Claim deleted"),
        (status = 400, description = "Claim is no longer pending"),
        (status = 403, description = "Caller is not the claimant"),
        (status = 404, description = "Claim not found")
    ),
    security(("jwt" = [])),
    tag = "claims"
)]
pub async fn delete_claim(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claim = load_claim(&state.db, &id).await?;
    let current = claim_rules::parse_stored_status(&claim.status)?;
    claim_rules::check_claimant_mutation(current, &claim.claimant_id, &user.id)?;

    claim.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "message": "Claim removed" })))
}
