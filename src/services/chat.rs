use crate::api::error::AppError;
use crate::entities::{chat_messages, chats, items, prelude::*};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use uuid::Uuid;

/// Find the chat for (item, requester, item owner) or create it.
///
/// Creation is an unconditional insert; the unique index on the normalized
/// participant pair turns the losing side of a race into a constraint
/// violation, after which the winner's row is fetched. Returns the chat and
/// whether it was newly created.
pub async fn find_or_create(
    db: &DatabaseConnection,
    item: &items::Model,
    requester_id: &str,
) -> Result<(chats::Model, bool), AppError> {
    if requester_id == item.user_id {
        return Err(AppError::BadRequest(
            "Cannot open a chat on your own item".to_string(),
        ));
    }

    let (user_a, user_b) = chats::normalize_pair(requester_id, &item.user_id);

    let now = Utc::now();
    let chat = chats::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        item_id: Set(item.id.clone()),
        user_a: Set(user_a.clone()),
        user_b: Set(user_b.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match chat.insert(db).await {
        Ok(model) => Ok((model, true)),
        Err(e) if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) => {
            let existing = Chats::find()
                .filter(chats::Column::ItemId.eq(&item.id))
                .filter(chats::Column::UserA.eq(&user_a))
                .filter(chats::Column::UserB.eq(&user_b))
                .one(db)
                .await?
                .ok_or_else(|| AppError::Internal("chat vanished after conflict".to_string()))?;
            Ok((existing, false))
        }
        Err(e) => Err(AppError::Database(e)),
    }
}

/// Persist a message to a chat. The caller broadcasts only after this
/// returns, so live listeners never see a message that would not survive
/// a reload.
pub async fn append_message(
    db: &DatabaseConnection,
    chat_id: &str,
    sender_id: &str,
    content: &str,
) -> Result<chat_messages::Model, AppError> {
    let chat = Chats::find_by_id(chat_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Chat not found".to_string()))?;

    if !chat.is_participant(sender_id) {
        return Err(AppError::Forbidden(
            "Not a participant of this chat".to_string(),
        ));
    }

    let now = Utc::now();
    let message = chat_messages::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        chat_id: Set(chat.id.clone()),
        sender_id: Set(sender_id.to_string()),
        content: Set(content.to_string()),
        read: Set(false),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    let mut chat: chats::ActiveModel = chat.into();
    chat.updated_at = Set(now);
    chat.update(db).await?;

    Ok(message)
}

/// Mark all messages from the other participant as read.
pub async fn mark_read(
    db: &DatabaseConnection,
    chat_id: &str,
    reader_id: &str,
) -> Result<(), AppError> {
    ChatMessages::update_many()
        .col_expr(chat_messages::Column::Read, Expr::value(true))
        .filter(chat_messages::Column::ChatId.eq(chat_id))
        .filter(chat_messages::Column::SenderId.ne(reader_id))
        .filter(chat_messages::Column::Read.eq(false))
        .exec(db)
        .await?;
    Ok(())
}

/// Whether any chat the user participates in holds unread messages from
/// the other side.
pub async fn has_unread(db: &DatabaseConnection, user_id: &str) -> Result<bool, AppError> {
    let chat_ids: Vec<String> = Chats::find()
        .filter(
            sea_orm::Condition::any()
                .add(chats::Column::UserA.eq(user_id))
                .add(chats::Column::UserB.eq(user_id)),
        )
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    if chat_ids.is_empty() {
        return Ok(false);
    }

    let unread = ChatMessages::find()
        .filter(chat_messages::Column::ChatId.is_in(chat_ids))
        .filter(chat_messages::Column::SenderId.ne(user_id))
        .filter(chat_messages::Column::Read.eq(false))
        .count(db)
        .await?;

    Ok(unread > 0)
}
