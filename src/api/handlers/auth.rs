use crate::api::error::AppError;
use crate::entities::{prelude::*, users};
use crate::utils::auth::create_jwt;
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct GoogleAuthRequest {
    /// Google ID token. Accepted under several field names for client
    /// library compatibility.
    pub token: Option<String>,
    pub credential: Option<String>,
    pub id_token: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: String,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            role: user.role,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

fn issue_token(state: &crate::AppState, user: &users::Model) -> Result<String, AppError> {
    create_jwt(&user.id, &state.config.jwt_secret).map_err(|e| AppError::Internal(e.to_string()))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Missing fields or email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<crate::AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string();

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(payload.name),
        email: Set(payload.email.to_lowercase()),
        password_hash: Set(Some(password_hash)),
        google_id: Set(None),
        avatar_url: Set(None),
        role: Set(users::ROLE_USER.to_string()),
        created_at: Set(Some(chrono::Utc::now())),
    };

    let user = user
        .insert(&state.db)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "User already exists"))?;

    let token = issue_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<crate::AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = Users::find()
        .filter(users::Column::Email.eq(payload.email.to_lowercase()))
        .one(&state.db)
        .await?
        .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

    // Google-only accounts have no password to check.
    let stored_hash = user
        .password_hash
        .as_deref()
        .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

    let argon2 = Argon2::default();
    let parsed_hash = argon2::PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    argon2
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let token = issue_token(&state, &user)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/google",
    request_body = GoogleAuthRequest,
    responses(
        (status = 200, description = "Google sign-in successful", body = AuthResponse),
        (status = 400, description = "Token missing or Google sign-in disabled"),
        (status = 401, description = "Token rejected by Google")
    ),
    tag = "auth"
)]
pub async fn google_auth(
    State(state): State<crate::AppState>,
    Json(payload): Json<GoogleAuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let id_token = payload
        .token
        .or(payload.credential)
        .or(payload.id_token)
        .ok_or_else(|| {
            AppError::BadRequest(
                "Google token required. Expected field: 'token', 'credential', or 'id_token'"
                    .to_string(),
            )
        })?;

    let profile = state.google.verify(&id_token).await?;
    let email = profile.email.to_lowercase();

    let existing = Users::find()
        .filter(
            sea_orm::Condition::any()
                .add(users::Column::GoogleId.eq(&profile.google_id))
                .add(users::Column::Email.eq(&email)),
        )
        .one(&state.db)
        .await?;

    let user = match existing {
        Some(user) if user.google_id.is_none() => {
            // Existing password account: link the Google identity in place.
            let mut active: users::ActiveModel = user.into();
            active.google_id = Set(Some(profile.google_id.clone()));
            if let Some(picture) = &profile.picture {
                active.avatar_url = Set(Some(picture.clone()));
            }
            active.update(&state.db).await?
        }
        Some(user) => user,
        None => {
            users::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                name: Set(profile.name.clone()),
                email: Set(email),
                password_hash: Set(None),
                google_id: Set(Some(profile.google_id.clone())),
                avatar_url: Set(profile.picture.clone()),
                role: Set(users::ROLE_USER.to_string()),
                created_at: Set(Some(chrono::Utc::now())),
            }
            .insert(&state.db)
            .await?
        }
    };

    let token = issue_token(&state, &user)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "auth"
)]
pub async fn me(Extension(user): Extension<users::Model>) -> Json<UserResponse> {
    Json(user.into())
}
