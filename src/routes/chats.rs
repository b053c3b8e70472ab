use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::require_chat_member;
use crate::models::chat::{Chat, CreateChat};
use crate::models::user::Identity;
use crate::models::DataResponse;
use crate::state::AppState;

/// Return the 1:1 chat between the caller and `user_id`, creating it if needed.
pub async fn create_chat(
    state: State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateChat>,
) -> Result<(StatusCode, Json<DataResponse<Chat>>), AppError> {
    if input.user_id == auth.user_id {
        return Err(AppError::BadRequest("cannot open a chat with yourself".to_string()));
    }
    let peer = db::users::get_user(&state.db, input.user_id).await?;

    let (chat_id, created) = db::chats::open_direct_chat(&state.db, auth.user_id, peer.id).await?;
    let status = if created {
        tracing::info!(%chat_id, user_id = auth.user_id, peer_id = peer.id, "chat created");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let chat = db::chats::load_chat(&state.db, chat_id).await?;
    Ok((status, Json(DataResponse::new(chat))))
}

pub async fn list_chats(
    state: State<AppState>,
    auth: AuthUser,
) -> Result<Json<DataResponse<Vec<Chat>>>, AppError> {
    let ids = db::chats::list_chat_ids_for_user(&state.db, auth.user_id).await?;
    let mut chats = Vec::with_capacity(ids.len());
    for chat_id in ids {
        chats.push(db::chats::load_chat(&state.db, chat_id).await?);
    }
    Ok(Json(DataResponse::new(chats)))
}

pub async fn get_chat(
    state: State<AppState>,
    Path(chat_id): Path<Uuid>,
    auth: AuthUser,
) -> Result<Json<DataResponse<Chat>>, AppError> {
    require_chat_member(&state.db, chat_id, auth.user_id).await?;
    let chat = db::chats::load_chat(&state.db, chat_id).await?;
    Ok(Json(DataResponse::new(chat)))
}

/// Who is connected to the chat right now.
pub async fn list_online(
    state: State<AppState>,
    Path(chat_id): Path<Uuid>,
    auth: AuthUser,
) -> Result<Json<DataResponse<Vec<Identity>>>, AppError> {
    require_chat_member(&state.db, chat_id, auth.user_id).await?;
    Ok(Json(DataResponse::new(state.registry().online(chat_id))))
}
