use sqlx::SqlitePool;
use uuid::Uuid;

use super::{messages, parse_uuid};
use crate::error::AppError;
use crate::models::chat::{Chat, ChatRow};
use crate::models::user::Identity;

pub async fn chat_exists(pool: &SqlitePool, chat_id: Uuid) -> Result<bool, AppError> {
    let row = sqlx::query_scalar::<_, i64>("SELECT 1 FROM chats WHERE id = ?")
        .bind(chat_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn is_member(pool: &SqlitePool, chat_id: Uuid, user_id: i64) -> Result<bool, AppError> {
    let row = sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM chat_members WHERE chat_id = ? AND user_id = ? LIMIT 1",
    )
    .bind(chat_id.to_string())
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

pub async fn get_chat_row(pool: &SqlitePool, chat_id: Uuid) -> Result<ChatRow, AppError> {
    let (id, created_at) =
        sqlx::query_as::<_, (String, String)>("SELECT id, created_at FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("unknown_chat".to_string()))?;

    Ok(ChatRow {
        id: parse_uuid(&id)?,
        created_at,
    })
}

pub async fn list_members(pool: &SqlitePool, chat_id: Uuid) -> Result<Vec<Identity>, AppError> {
    let rows = sqlx::query_as::<_, (i64, String)>(
        "SELECT u.id, u.email FROM chat_members cm JOIN users u ON cm.user_id = u.id WHERE cm.chat_id = ? ORDER BY u.id",
    )
    .bind(chat_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, email)| Identity { id, email })
        .collect())
}

fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

async fn insert_chat(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    chat_id: Uuid,
    members: &[i64],
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO chats (id) VALUES (?)")
        .bind(chat_id.to_string())
        .execute(&mut **tx)
        .await?;

    for user_id in members {
        sqlx::query("INSERT OR IGNORE INTO chat_members (chat_id, user_id) VALUES (?, ?)")
            .bind(chat_id.to_string())
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// The 1:1 chat between two users, if one exists.
pub async fn find_direct_chat(
    pool: &SqlitePool,
    user_a: i64,
    user_b: i64,
) -> Result<Option<Uuid>, AppError> {
    let (low, high) = ordered_pair(user_a, user_b);
    let row = sqlx::query_scalar::<_, String>(
        "SELECT chat_id FROM direct_chats WHERE user_low = ? AND user_high = ?",
    )
    .bind(low)
    .bind(high)
    .fetch_optional(pool)
    .await?;

    row.as_deref().map(parse_uuid).transpose()
}

/// Get or create the 1:1 chat between two users. The bool is true when this
/// call created it. Concurrent callers for the same pair get the same chat.
pub async fn open_direct_chat(
    pool: &SqlitePool,
    user_a: i64,
    user_b: i64,
) -> Result<(Uuid, bool), AppError> {
    if let Some(chat_id) = find_direct_chat(pool, user_a, user_b).await? {
        return Ok((chat_id, false));
    }

    let (low, high) = ordered_pair(user_a, user_b);
    let chat_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;
    insert_chat(&mut tx, chat_id, &[low, high]).await?;

    let claimed = sqlx::query(
        "INSERT OR IGNORE INTO direct_chats (user_low, user_high, chat_id) VALUES (?, ?, ?)",
    )
    .bind(low)
    .bind(high)
    .bind(chat_id.to_string())
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    if !claimed {
        // lost the race; use the winner's chat
        tx.rollback().await?;
        let existing = find_direct_chat(pool, low, high)
            .await?
            .ok_or_else(|| AppError::Internal(format!("direct chat {low}/{high} vanished")))?;
        return Ok((existing, false));
    }

    tx.commit().await?;
    Ok((chat_id, true))
}

/// Create a chat with an arbitrary member list.
pub async fn create_chat(pool: &SqlitePool, members: &[i64]) -> Result<Uuid, AppError> {
    let chat_id = Uuid::new_v4();
    let mut tx = pool.begin().await?;
    insert_chat(&mut tx, chat_id, members).await?;
    tx.commit().await?;
    Ok(chat_id)
}

pub async fn list_chat_ids_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Uuid>, AppError> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT c.id FROM chats c JOIN chat_members cm ON cm.chat_id = c.id WHERE cm.user_id = ? ORDER BY c.created_at DESC, c.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|id| parse_uuid(id)).collect()
}

/// A chat with its members and latest message.
pub async fn load_chat(pool: &SqlitePool, chat_id: Uuid) -> Result<Chat, AppError> {
    let row = get_chat_row(pool, chat_id).await?;
    let chat_members = list_members(pool, chat_id).await?;
    let last_message = messages::last_message(pool, chat_id).await?;

    Ok(Chat {
        id: row.id,
        created_at: row.created_at,
        chat_members,
        last_message,
    })
}
