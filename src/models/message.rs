use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message as stored. Returned to the author as the acknowledgment of a send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: Uuid,
    pub author_id: i64,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessage {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
}
