use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{chats, messages, users};
use crate::gateway::error::{AuthError, StoreError};
use crate::gateway::services::{AccessChecker, Authenticator, MessageStore, RoomLookup};
use crate::middleware::auth::{create_token_hash, strip_bearer};
use crate::models::message::Message;
use crate::models::user::Identity;

/// SQLite-backed implementation of every gateway collaborator.
#[derive(Clone)]
pub struct SqlBackend {
    pool: SqlitePool,
}

impl SqlBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Authenticator for SqlBackend {
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        let token = strip_bearer(credential);
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let owner = users::find_token_owner(&self.pool, &create_token_hash(token))
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?
            .ok_or(AuthError::InvalidCredential)?;

        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        if owner.expires_at < now {
            return Err(AuthError::Expired);
        }
        if !owner.is_active {
            return Err(AuthError::Inactive);
        }

        Ok(Identity {
            id: owner.user_id,
            email: owner.email,
        })
    }
}

#[async_trait]
impl RoomLookup for SqlBackend {
    async fn exists(&self, room_id: Uuid) -> bool {
        chats::chat_exists(&self.pool, room_id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(%room_id, "room lookup failed: {e:?}");
                false
            })
    }
}

#[async_trait]
impl AccessChecker for SqlBackend {
    async fn can_access(&self, room_id: Uuid, user_id: i64) -> bool {
        chats::is_member(&self.pool, room_id, user_id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(%room_id, user_id, "access check failed: {e:?}");
                false
            })
    }
}

#[async_trait]
impl MessageStore for SqlBackend {
    async fn persist(&self, room_id: Uuid, author_id: i64, text: &str) -> Result<Message, StoreError> {
        messages::create_message(&self.pool, room_id, author_id, text)
            .await
            .map_err(|e| StoreError(format!("{e:?}")))
    }
}
