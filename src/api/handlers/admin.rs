use crate::api::error::AppError;
use crate::entities::{items, prelude::*, users};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: u64,
    pub total_items: u64,
    pub lost_items: u64,
    pub found_items: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats),
        (status = 403, description = "Not an admin")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn get_dashboard_stats(
    State(state): State<crate::AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    let total_users = Users::find().count(&state.db).await?;
    let total_items = Items::find().count(&state.db).await?;
    let lost_items = Items::find()
        .filter(items::Column::ItemType.eq(items::TYPE_LOST))
        .count(&state.db)
        .await?;
    let found_items = Items::find()
        .filter(items::Column::ItemType.eq(items::TYPE_FOUND))
        .count(&state.db)
        .await?;

    Ok(Json(DashboardStats {
        total_users,
        total_items,
        lost_items,
        found_items,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users, newest first"),
        (status = 403, description = "Not an admin")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn get_all_users(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<users::Model>>, AppError> {
    let result = Users::find()
        .order_by_desc(users::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/admin/items",
    responses(
        (status = 200, description = "All items regardless of status"),
        (status = 403, description = "Not an admin")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn get_all_items(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<items::Model>>, AppError> {
    let result = Items::find()
        .order_by_desc(items::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(result))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated"),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Caller is not a super admin, or target is one"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn update_user_role(
    State(state): State<crate::AppState>,
    Extension(caller): Extension<users::Model>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    // Only super admins manage roles.
    if !caller.is_super_admin() {
        return Err(AppError::Forbidden(
            "Only Super Admins can manage roles".to_string(),
        ));
    }

    if payload.role != users::ROLE_USER && payload.role != users::ROLE_ADMIN {
        return Err(AppError::BadRequest("Unknown role".to_string()));
    }

    let user = Users::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.is_super_admin() {
        return Err(AppError::Forbidden(
            "Cannot modify a Super Admin".to_string(),
        ));
    }

    let mut active: users::ActiveModel = user.into();
    active.role = Set(payload.role);
    active.update(&state.db).await?;

    Ok(Json(serde_json::json!({ "message": "User role updated" })))
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User and their items removed"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "User not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = Users::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    // Their postings go with them.
    Items::delete_many()
        .filter(items::Column::UserId.eq(&user.id))
        .exec(&state.db)
        .await?;
    user.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "message": "User removed" })))
}

#[utoipa::path(
    delete,
    path = "/admin/items/{id}",
    params(("id" = String, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item removed"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Item not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn delete_item(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let item = Items::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

    item.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "message": "Item removed" })))
}
