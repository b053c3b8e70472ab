use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;
use crate::error::AppError;
use crate::models::message::Message;

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> Result<Message, AppError> {
    let chat_id: String = row.get("chat_id");
    Ok(Message {
        id: row.get("id"),
        chat_id: parse_uuid(&chat_id)?,
        author_id: row.get("author_id"),
        text: row.get("text"),
        created_at: row.get("created_at"),
    })
}

const SELECT_MESSAGES: &str = "SELECT id, chat_id, author_id, text, created_at FROM messages";

pub async fn get_message(pool: &SqlitePool, message_id: i64) -> Result<Message, AppError> {
    let row = sqlx::query(&format!("{SELECT_MESSAGES} WHERE id = ?"))
        .bind(message_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_message".to_string()))?;

    row_to_message(row)
}

pub async fn create_message(
    pool: &SqlitePool,
    chat_id: Uuid,
    author_id: i64,
    text: &str,
) -> Result<Message, AppError> {
    let result = sqlx::query("INSERT INTO messages (chat_id, author_id, text) VALUES (?, ?, ?)")
        .bind(chat_id.to_string())
        .bind(author_id)
        .bind(text)
        .execute(pool)
        .await?;

    get_message(pool, result.last_insert_rowid()).await
}

/// Newest first.
pub async fn list_messages(
    pool: &SqlitePool,
    chat_id: Uuid,
    limit: i64,
) -> Result<Vec<Message>, AppError> {
    let rows = sqlx::query(&format!(
        "{SELECT_MESSAGES} WHERE chat_id = ? ORDER BY id DESC LIMIT ?"
    ))
    .bind(chat_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_message).collect()
}

pub async fn last_message(pool: &SqlitePool, chat_id: Uuid) -> Result<Option<Message>, AppError> {
    Ok(list_messages(pool, chat_id, 1).await?.into_iter().next())
}
