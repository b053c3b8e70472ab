use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::middleware::auth::{create_token_hash, generate_token};
use crate::models::user::{CreateUser, User};

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

const SELECT_USERS: &str = "SELECT id, email, is_active, created_at FROM users";

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<User, AppError> {
    let row = sqlx::query(&format!("{SELECT_USERS} WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_user".to_string()))?;

    Ok(row_to_user(row))
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<User, AppError> {
    let row = sqlx::query(&format!("{SELECT_USERS} WHERE email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("unknown_user".to_string()))?;

    Ok(row_to_user(row))
}

pub async fn create_user(pool: &SqlitePool, input: &CreateUser) -> Result<User, AppError> {
    let email = input.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("a valid email is required".to_string()));
    }

    let result = sqlx::query("INSERT INTO users (email) VALUES (?)")
        .bind(email)
        .execute(pool)
        .await?;

    get_user(pool, result.last_insert_rowid()).await
}

pub async fn set_active(pool: &SqlitePool, user_id: i64, active: bool) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Store a new bearer token for the user and return it in the clear. Only the
/// hash is persisted.
pub async fn issue_token(pool: &SqlitePool, user_id: i64, ttl_secs: i64) -> Result<String, AppError> {
    let token = generate_token();
    let expires_at = (chrono::Utc::now() + chrono::Duration::seconds(ttl_secs))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();

    sqlx::query("INSERT INTO user_tokens (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(create_token_hash(&token))
        .bind(user_id)
        .bind(&expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

/// A token row joined with its owner.
pub struct TokenOwner {
    pub user_id: i64,
    pub email: String,
    pub is_active: bool,
    pub expires_at: String,
}

pub async fn find_token_owner(
    pool: &SqlitePool,
    token_hash: &str,
) -> Result<Option<TokenOwner>, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64, String, bool, String)>(
        "SELECT u.id, u.email, u.is_active, ut.expires_at FROM user_tokens ut JOIN users u ON ut.user_id = u.id WHERE ut.token_hash = ?",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(user_id, email, is_active, expires_at)| TokenOwner {
        user_id,
        email,
        is_active,
        expires_at,
    }))
}
