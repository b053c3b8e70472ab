use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;

/// 404 when the chat does not exist, 403 when the user is not one of its members.
pub async fn require_chat_member(
    pool: &SqlitePool,
    chat_id: Uuid,
    user_id: i64,
) -> Result<(), AppError> {
    if !db::chats::chat_exists(pool, chat_id).await? {
        return Err(AppError::NotFound("unknown_chat".to_string()));
    }
    if !db::chats::is_member(pool, chat_id, user_id).await? {
        return Err(AppError::Forbidden(
            "you are not a member of this chat".to_string(),
        ));
    }
    Ok(())
}
