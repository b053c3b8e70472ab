use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;
use super::user::Identity;

#[derive(Debug, Clone, Serialize)]
pub struct Chat {
    pub id: Uuid,
    pub created_at: String,
    pub chat_members: Vec<Identity>,
    /// Most recent message, if any.
    pub last_message: Option<Message>,
}

/// Row from the `chats` table before members are loaded.
#[derive(Debug, Clone)]
pub struct ChatRow {
    pub id: Uuid,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateChat {
    /// The other participant of the 1:1 chat.
    pub user_id: i64,
}
