use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::require_chat_member;
use crate::models::message::{CreateMessage, ListMessagesQuery, Message};
use crate::models::DataResponse;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

/// Most recent messages, newest first.
pub async fn list_messages(
    state: State<AppState>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
    auth: AuthUser,
) -> Result<Json<DataResponse<Vec<Message>>>, AppError> {
    require_chat_member(&state.db, chat_id, auth.user_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let messages = db::messages::list_messages(&state.db, chat_id, limit).await?;
    Ok(Json(DataResponse::new(messages)))
}

/// Persist a message and fan it out to everyone connected to the chat.
pub async fn create_message(
    state: State<AppState>,
    Path(chat_id): Path<Uuid>,
    auth: AuthUser,
    Json(input): Json<CreateMessage>,
) -> Result<(StatusCode, Json<DataResponse<Message>>), AppError> {
    let message = state
        .registry()
        .send(chat_id, &auth.identity(), &input.text)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(message))))
}
