//! Collaborators the gateway consumes but does not implement.
//!
//! `db::SqlBackend` provides all of them for the running server; tests plug in
//! in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::error::{AuthError, StoreError};
use crate::models::message::Message;
use crate::models::user::Identity;

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a bearer credential (with or without the `Bearer ` prefix).
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError>;
}

#[async_trait]
pub trait AccessChecker: Send + Sync {
    async fn can_access(&self, room_id: Uuid, user_id: i64) -> bool;
}

#[async_trait]
pub trait RoomLookup: Send + Sync {
    async fn exists(&self, room_id: Uuid) -> bool;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn persist(&self, room_id: Uuid, author_id: i64, text: &str) -> Result<Message, StoreError>;
}

/// The collaborators a `RoomRegistry` calls into.
#[derive(Clone)]
pub struct Services {
    pub rooms: Arc<dyn RoomLookup>,
    pub access: Arc<dyn AccessChecker>,
    pub store: Arc<dyn MessageStore>,
}

impl Services {
    /// Use one backend for every collaborator.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: RoomLookup + AccessChecker + MessageStore + 'static,
    {
        Self {
            rooms: backend.clone(),
            access: backend.clone(),
            store: backend,
        }
    }
}
