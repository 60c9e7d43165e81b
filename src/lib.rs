pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;
pub mod ws;

use crate::config::AppConfig;
use crate::services::ai_search::AiSearchClient;
use crate::services::google::GoogleVerifier;
use crate::services::mailer::Mailer;
use crate::services::storage::StorageService;
use crate::ws::hub::ChatHub;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::google_auth,
        api::handlers::auth::me,
        api::handlers::users::update_profile,
        api::handlers::items::create_item,
        api::handlers::items::list_items,
        api::handlers::items::get_my_items,
        api::handlers::items::get_item,
        api::handlers::items::delete_item,
        api::handlers::items::update_status,
        api::handlers::items::vote_item,
        api::handlers::matches::get_item_matches,
        api::handlers::claims::create_claim,
        api::handlers::claims::list_claims,
        api::handlers::claims::get_my_claims,
        api::handlers::claims::get_claims_by_item,
        api::handlers::claims::update_claim_status,
        api::handlers::claims::resolve_claim,
        api::handlers::claims::update_claim_message,
        api::handlers::claims::delete_claim,
        api::handlers::comments::add_comment,
        api::handlers::comments::get_comments,
        api::handlers::chats::create_or_get_chat,
        api::handlers::chats::get_my_chats,
        api::handlers::chats::get_unread,
        api::handlers::chats::get_chat,
        api::handlers::chats::mark_chat_read,
        api::handlers::admin::get_dashboard_stats,
        api::handlers::admin::get_all_users,
        api::handlers::admin::get_all_items,
        api::handlers::admin::update_user_role,
        api::handlers::admin::delete_user,
        api::handlers::admin::delete_item,
        api::handlers::ai::search_items_ai,
        api::handlers::uploads::upload_image,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::GoogleAuthRequest,
            api::handlers::auth::UserResponse,
            api::handlers::auth::AuthResponse,
            api::handlers::users::UpdateProfileRequest,
            api::handlers::items::CreateItemRequest,
            api::handlers::items::VoteRequest,
            api::handlers::items::VoteResponse,
            api::handlers::items::UpdateStatusRequest,
            api::handlers::claims::CreateClaimRequest,
            api::handlers::claims::UpdateClaimStatusRequest,
            api::handlers::claims::UpdateClaimMessageRequest,
            api::handlers::comments::CreateCommentRequest,
            api::handlers::chats::CreateChatRequest,
            api::handlers::chats::UnreadResponse,
            api::handlers::admin::DashboardStats,
            api::handlers::admin::UpdateRoleRequest,
            api::handlers::ai::AiSearchRequest,
            api::handlers::uploads::UploadResponse,
            api::handlers::health::HealthResponse,
            services::ai_search::ExtractedFilters,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "items", description = "Lost and found item postings"),
        (name = "matches", description = "Counterpart matching"),
        (name = "claims", description = "Ownership claims"),
        (name = "chats", description = "Item-scoped conversations"),
        (name = "admin", description = "Moderation endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub mailer: Arc<dyn Mailer>,
    pub google: Arc<GoogleVerifier>,
    pub ai: Arc<AiSearchClient>,
    pub hub: Arc<ChatHub>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    let auth = |state: &AppState| {
        from_fn_with_state(state.clone(), api::middleware::auth::auth_middleware)
    };

    let cors_origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/auth/register", post(api::handlers::auth::register))
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/google", post(api::handlers::auth::google_auth))
        .route(
            "/auth/me",
            get(api::handlers::auth::me).layer(auth(&state)),
        )
        .route(
            "/users/profile",
            put(api::handlers::users::update_profile).layer(auth(&state)),
        )
        .route(
            "/items",
            post(api::handlers::items::create_item).layer(auth(&state)),
        )
        .route("/items", get(api::handlers::items::list_items))
        .route(
            "/items/user/me",
            get(api::handlers::items::get_my_items).layer(auth(&state)),
        )
        .route("/items/:id", get(api::handlers::items::get_item))
        .route(
            "/items/:id",
            delete(api::handlers::items::delete_item).layer(auth(&state)),
        )
        .route(
            "/items/:id/status",
            put(api::handlers::items::update_status).layer(auth(&state)),
        )
        .route(
            "/items/:id/vote",
            post(api::handlers::items::vote_item).layer(auth(&state)),
        )
        .route(
            "/items/:id/matches",
            get(api::handlers::matches::get_item_matches),
        )
        .route(
            "/items/:id/comments",
            post(api::handlers::comments::add_comment).layer(auth(&state)),
        )
        .route(
            "/items/:id/comments",
            get(api::handlers::comments::get_comments),
        )
        .route(
            "/claims",
            post(api::handlers::claims::create_claim)
                .get(api::handlers::claims::list_claims)
                .layer(auth(&state)),
        )
        .route(
            "/claims/user/me",
            get(api::handlers::claims::get_my_claims).layer(auth(&state)),
        )
        .route(
            "/claims/item/:item_id",
            get(api::handlers::claims::get_claims_by_item).layer(auth(&state)),
        )
        .route(
            "/claims/:id",
            put(api::handlers::claims::update_claim_status)
                .delete(api::handlers::claims::delete_claim)
                .layer(auth(&state)),
        )
        .route(
            "/claims/:id/resolve",
            put(api::handlers::claims::resolve_claim).layer(auth(&state)),
        )
        .route(
            "/claims/:id/message",
            put(api::handlers::claims::update_claim_message).layer(auth(&state)),
        )
        .route(
            "/chats",
            post(api::handlers::chats::create_or_get_chat)
                .get(api::handlers::chats::get_my_chats)
                .layer(auth(&state)),
        )
        .route(
            "/chats/unread",
            get(api::handlers::chats::get_unread).layer(auth(&state)),
        )
        .route(
            "/chats/:id",
            get(api::handlers::chats::get_chat).layer(auth(&state)),
        )
        .route(
            "/chats/:id/read",
            put(api::handlers::chats::mark_chat_read).layer(auth(&state)),
        )
        .route(
            "/uploads",
            post(api::handlers::uploads::upload_image)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_upload_size + 1024 * 1024, // multipart overhead
                ))
                .layer(auth(&state)),
        )
        .route(
            "/admin/stats",
            get(api::handlers::admin::get_dashboard_stats)
                .layer(from_fn(api::middleware::auth::require_admin))
                .layer(auth(&state)),
        )
        .route(
            "/admin/users",
            get(api::handlers::admin::get_all_users)
                .layer(from_fn(api::middleware::auth::require_admin))
                .layer(auth(&state)),
        )
        .route(
            "/admin/items",
            get(api::handlers::admin::get_all_items)
                .layer(from_fn(api::middleware::auth::require_admin))
                .layer(auth(&state)),
        )
        .route(
            "/admin/users/:id/role",
            put(api::handlers::admin::update_user_role)
                .layer(from_fn(api::middleware::auth::require_admin))
                .layer(auth(&state)),
        )
        .route(
            "/admin/users/:id",
            delete(api::handlers::admin::delete_user)
                .layer(from_fn(api::middleware::auth::require_admin))
                .layer(auth(&state)),
        )
        .route(
            "/admin/items/:id",
            delete(api::handlers::admin::delete_item)
                .layer(from_fn(api::middleware::auth::require_admin))
                .layer(auth(&state)),
        )
        .route("/ai/search", post(api::handlers::ai::search_items_ai))
        .route("/ws", get(ws::handler::ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
