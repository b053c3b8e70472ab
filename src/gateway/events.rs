use serde::{Deserialize, Serialize};

use crate::models::message::Message;
use crate::models::user::Identity;

/// Close codes sent when the server ends a connection.
pub mod close_code {
    pub const INTERNAL_ERROR: u16 = 1011;
    pub const AUTH_FAILED: u16 = 4001;
    pub const ACCESS_DENIED: u16 = 4003;
    pub const ROOM_NOT_FOUND: u16 = 4004;
    pub const EVICTED: u16 = 4008;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connect,
    Disconnect,
    Message,
    Error,
}

/// One self-describing broadcast unit. Each envelope encodes to a single
/// text frame and can be decoded without any earlier frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: EventKind,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
    /// Roster snapshot at emission time, ordered by first arrival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_users: Option<Vec<Identity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Envelope {
    pub fn connect(user: Identity, online_users: Vec<Identity>) -> Self {
        Self {
            kind: EventKind::Connect,
            message: String::new(),
            user: Some(user),
            online_users: Some(online_users),
            message_id: None,
            created_at: None,
        }
    }

    pub fn disconnect(user: Identity, online_users: Vec<Identity>) -> Self {
        Self {
            kind: EventKind::Disconnect,
            message: String::new(),
            user: Some(user),
            online_users: Some(online_users),
            message_id: None,
            created_at: None,
        }
    }

    pub fn message(author: Identity, stored: &Message) -> Self {
        Self {
            kind: EventKind::Message,
            message: stored.text.clone(),
            user: Some(author),
            online_users: None,
            message_id: Some(stored.id),
            created_at: Some(stored.created_at.clone()),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            message: reason.into(),
            user: None,
            online_users: None,
            message_id: None,
            created_at: None,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A frame received from a client. Only `kind` is required so unknown kinds
/// still decode and can be skipped.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub kind: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// What the connection loop should do with an inbound frame.
#[derive(Debug, PartialEq, Eq)]
pub enum ClientAction {
    Send(String),
    Ignore,
}

impl ClientFrame {
    pub fn parse(raw: &str) -> ClientAction {
        let Ok(frame) = serde_json::from_str::<ClientFrame>(raw) else {
            return ClientAction::Ignore;
        };
        match frame.kind.as_str() {
            "message" | "send" => ClientAction::Send(frame.message.unwrap_or_default()),
            _ => ClientAction::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> Identity {
        Identity { id: 1, email: "alice@example.com".into() }
    }

    fn bob() -> Identity {
        Identity { id: 2, email: "bob@example.com".into() }
    }

    #[test]
    fn test_connect_envelope_shape() {
        let env = Envelope::connect(bob(), vec![alice(), bob()]);
        let value: serde_json::Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "connect",
                "message": "",
                "user": { "id": 2, "email": "bob@example.com" },
                "online_users": [
                    { "id": 1, "email": "alice@example.com" },
                    { "id": 2, "email": "bob@example.com" }
                ]
            })
        );
    }

    #[test]
    fn test_message_envelope_omits_roster() {
        let stored = Message {
            id: 7,
            chat_id: uuid::Uuid::nil(),
            author_id: 1,
            text: "hi".into(),
            created_at: "2024-01-01T00:00:00.000Z".into(),
        };
        let value: serde_json::Value =
            serde_json::from_str(&Envelope::message(alice(), &stored).encode().unwrap()).unwrap();
        assert_eq!(value["kind"], "message");
        assert_eq!(value["message"], "hi");
        assert_eq!(value["message_id"], 7);
        assert_eq!(value["user"]["id"], 1);
        assert!(value.get("online_users").is_none());
    }

    #[test]
    fn test_error_envelope_has_no_user() {
        let value: serde_json::Value =
            serde_json::from_str(&Envelope::error("nope").encode().unwrap()).unwrap();
        assert_eq!(value, json!({ "kind": "error", "message": "nope" }));
    }

    #[test]
    fn test_parse_send_and_alias() {
        assert_eq!(
            ClientFrame::parse(r#"{"kind":"message","message":"hi"}"#),
            ClientAction::Send("hi".into())
        );
        assert_eq!(
            ClientFrame::parse(r#"{"kind":"send","message":"yo"}"#),
            ClientAction::Send("yo".into())
        );
    }

    #[test]
    fn test_parse_ignores_unknown_and_garbage() {
        assert_eq!(ClientFrame::parse(r#"{"kind":"typing"}"#), ClientAction::Ignore);
        assert_eq!(ClientFrame::parse(r#"{"kind":"connect","message":"x"}"#), ClientAction::Ignore);
        assert_eq!(ClientFrame::parse("not json"), ClientAction::Ignore);
        assert_eq!(ClientFrame::parse(r#"{"message":"no kind"}"#), ClientAction::Ignore);
    }
}
