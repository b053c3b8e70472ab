use thiserror::Error;

/// Credential verification failures. The connection is refused before any
/// registry state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("credential expired")]
    Expired,
    #[error("user is not active")]
    Inactive,
    #[error("auth backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("room not found")]
    RoomNotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("session already registered")]
    AlreadyJoined,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaveError {
    #[error("session not found")]
    SessionNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("message store error: {0}")]
pub struct StoreError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("room not found")]
    RoomNotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport write timed out")]
    Timeout,
    #[error("transport I/O error: {0}")]
    Io(String),
}
