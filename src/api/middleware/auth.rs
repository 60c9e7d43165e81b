use crate::utils::auth::validate_jwt;
use crate::{AppState, entities::prelude::Users, entities::users};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Bearer-token middleware. Accepts the JWT from the Authorization header
/// or a `token` query parameter, verifies it, and loads the user row so
/// handlers get both `Claims` and the full `users::Model` as extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let token = if let Some(t) = auth_header {
        Some(t)
    } else {
        // Try query parameter
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    };

    if let Some(token) = token {
        let secret = &state.config.jwt_secret;

        if let Ok(claims) = validate_jwt(&token, secret) {
            // The user may have been deleted since the token was issued.
            let user = Users::find_by_id(claims.sub.clone())
                .one(&state.db)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

            if let Some(user) = user {
                req.extensions_mut().insert(claims);
                req.extensions_mut().insert(user);
                return Ok(next.run(req).await);
            }
        }
    }

    Err(StatusCode::UNAUTHORIZED)
}

/// Role guard layered after `auth_middleware` on admin routes.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, StatusCode> {
    let is_admin = req
        .extensions()
        .get::<users::Model>()
        .map(|user| user.is_admin());

    match is_admin {
        Some(true) => Ok(next.run(req).await),
        Some(false) => Err(StatusCode::FORBIDDEN),
        None => Err(StatusCode::UNAUTHORIZED),
    }
}
