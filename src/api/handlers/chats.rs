use crate::api::error::AppError;
use crate::entities::{chat_messages, chats, items, prelude::*, users};
use crate::services::chat;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateChatRequest {
    pub item_id: String,
}

#[derive(Serialize)]
pub struct ChatParticipant {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Serialize)]
pub struct ChatItemInfo {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub images: serde_json::Value,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub id: String,
    pub item: Option<ChatItemInfo>,
    pub participants: Vec<ChatParticipant>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
pub struct ChatDetailResponse {
    #[serde(flatten)]
    pub chat: ChatResponse,
    pub messages: Vec<chat_messages::Model>,
}

#[derive(Serialize, ToSchema)]
pub struct UnreadResponse {
    pub has_unread: bool,
}

fn participant(user: &users::Model) -> ChatParticipant {
    ChatParticipant {
        id: user.id.clone(),
        name: user.name.clone(),
        avatar_url: user.avatar_url.clone(),
    }
}

fn item_info(item: &items::Model) -> ChatItemInfo {
    ChatItemInfo {
        id: item.id.clone(),
        title: item.title.clone(),
        item_type: item.item_type.clone(),
        images: item.images.clone(),
    }
}

/// Assemble response views for a batch of chats without per-chat queries.
async fn hydrate_chats(
    db: &sea_orm::DatabaseConnection,
    chats: Vec<chats::Model>,
) -> Result<Vec<ChatResponse>, AppError> {
    let item_ids: Vec<String> = chats.iter().map(|c| c.item_id.clone()).collect();
    let user_ids: Vec<String> = chats
        .iter()
        .flat_map(|c| [c.user_a.clone(), c.user_b.clone()])
        .collect();

    let items_by_id: HashMap<String, items::Model> = Items::find()
        .filter(items::Column::Id.is_in(item_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|i| (i.id.clone(), i))
        .collect();

    let users_by_id: HashMap<String, users::Model> = Users::find()
        .filter(users::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    Ok(chats
        .into_iter()
        .map(|c| ChatResponse {
            item: items_by_id.get(&c.item_id).map(item_info),
            participants: [&c.user_a, &c.user_b]
                .iter()
                .filter_map(|id| users_by_id.get(*id).map(participant))
                .collect(),
            id: c.id,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect())
}

#[utoipa::path(
    post,
    path = "/chats",
    request_body = CreateChatRequest,
    responses(
        (status = 200, description = "Existing chat returned"),
        (status = 201, description = "Chat created"),
        (status = 400, description = "Chat with yourself"),
        (status = 404, description = "Item not found")
    ),
    security(("jwt" = [])),
    tag = "chats"
)]
pub async fn create_or_get_chat(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Json(payload): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    let item = Items::find_by_id(&payload.item_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

    let (chat, created) = chat::find_or_create(&state.db, &item, &user.id).await?;

    let mut hydrated = hydrate_chats(&state.db, vec![chat]).await?;
    let response = hydrated
        .pop()
        .ok_or_else(|| AppError::Internal("chat hydration failed".to_string()))?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

#[utoipa::path(
    get,
    path = "/chats",
    responses(
        (status = 200, description = "Caller's chats, most recently active first"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "chats"
)]
pub async fn get_my_chats(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
) -> Result<Json<Vec<ChatResponse>>, AppError> {
    let my_chats = Chats::find()
        .filter(
            sea_orm::Condition::any()
                .add(chats::Column::UserA.eq(&user.id))
                .add(chats::Column::UserB.eq(&user.id)),
        )
        .order_by_desc(chats::Column::UpdatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(hydrate_chats(&state.db, my_chats).await?))
}

#[utoipa::path(
    get,
    path = "/chats/unread",
    responses(
        (status = 200, description = "Whether unread messages exist", body = UnreadResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "chats"
)]
pub async fn get_unread(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
) -> Result<Json<UnreadResponse>, AppError> {
    let has_unread = chat::has_unread(&state.db, &user.id).await?;
    Ok(Json(UnreadResponse { has_unread }))
}

#[utoipa::path(
    get,
    path = "/chats/{id}",
    params(("id" = String, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Chat with messages"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Chat not found")
    ),
    security(("jwt" = [])),
    tag = "chats"
)]
pub async fn get_chat(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
) -> Result<Json<ChatDetailResponse>, AppError> {
    let chat = Chats::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))?;

    if !chat.is_participant(&user.id) {
        return Err(AppError::Forbidden(
            "Not a participant of this chat".to_string(),
        ));
    }

    let messages = ChatMessages::find()
        .filter(chat_messages::Column::ChatId.eq(&chat.id))
        .order_by_asc(chat_messages::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let mut hydrated = hydrate_chats(&state.db, vec![chat]).await?;
    let chat = hydrated
        .pop()
        .ok_or_else(|| AppError::Internal("chat hydration failed".to_string()))?;

    Ok(Json(ChatDetailResponse { chat, messages }))
}

#[utoipa::path(
    put,
    path = "/chats/{id}/read",
    params(("id" = String, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Messages marked as read"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Chat not found")
    ),
    security(("jwt" = [])),
    tag = "chats"
)]
pub async fn mark_chat_read(
    State(state): State<crate::AppState>,
    Extension(user): Extension<users::Model>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let chat = Chats::find_by_id(&id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))?;

    if !chat.is_participant(&user.id) {
        return Err(AppError::Forbidden(
            "Not a participant of this chat".to_string(),
        ));
    }

    chat::mark_read(&state.db, &chat.id, &user.id).await?;

    Ok(Json(serde_json::json!({ "message": "Messages marked as read" })))
}
