use crate::api::error::AppError;
use crate::api::handlers::auth::UserResponse;
use crate::entities::users;
use axum::{Extension, Json, extract::State};
use sea_orm::{ActiveModelTrait, Set};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[utoipa::path(
    put,
    path = "/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "users"
)]
pub async fn update_profile(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut active: users::ActiveModel = user.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(avatar_url) = payload.avatar_url {
        active.avatar_url = Set(Some(avatar_url));
    }
    let user = active.update(&state.db).await?;

    Ok(Json(user.into()))
}
