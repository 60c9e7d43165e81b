use crate::api::error::AppError;
use crate::entities::{comments, prelude::*, users};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Hard cap on comment length.
const MAX_COMMENT_LEN: u64 = 1000;

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 1000, message = "Content must be 1-1000 characters"))]
    pub content: String,
}

#[derive(Serialize)]
pub struct CommentResponse {
    #[serde(flatten)]
    pub comment: comments::Model,
    pub user_name: Option<String>,
}

#[utoipa::path(
    post,
    path = "/items/{id}/comments",
    params(("id" = String, Path, description = "Item id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created"),
        (status = 400, description = "Empty or oversized content"),
        (status = 404, description = "Item not found")
    ),
    security(("jwt" = [])),
    tag = "comments"
)]
pub async fn add_comment(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(item_id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    payload
        .validate()
        .map_err(|_| {
            AppError::BadRequest(format!(
                "Content is required and limited to {MAX_COMMENT_LEN} characters"
            ))
        })?;

    Items::find_by_id(&item_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

    let comment = comments::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        item_id: Set(item_id),
        user_id: Set(user.id.clone()),
        content: Set(payload.content),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            comment,
            user_name: Some(user.name),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/items/{id}/comments",
    params(("id" = String, Path, description = "Item id")),
    responses(
        (status = 200, description = "Comments for an item, newest first")
    ),
    tag = "comments"
)]
pub async fn get_comments(
    State(state): State<crate::AppState>,
    Path(item_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let comments = Comments::find()
        .filter(comments::Column::ItemId.eq(&item_id))
        .order_by_desc(comments::Column::CreatedAt)
        .all(&state.db)
        .await?;

    // Batch-resolve author names.
    let user_ids: Vec<String> = comments.iter().map(|c| c.user_id.clone()).collect();
    let names: HashMap<String, String> = Users::find()
        .filter(users::Column::Id.is_in(user_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    let result = comments
        .into_iter()
        .map(|comment| {
            let user_name = names.get(&comment.user_id).cloned();
            CommentResponse { comment, user_name }
        })
        .collect();

    Ok(Json(result))
}
