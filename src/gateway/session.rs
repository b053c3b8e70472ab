use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::user::Identity;

/// An encoded envelope. Shared between every recipient of one fan-out.
pub type Frame = Arc<str>;

/// Identifies one live connection, never a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A connection registered (or about to be registered) in one room.
///
/// The registry only ever holds the sending half of the session's outbound
/// queue. Dropping the `Session` closes that queue, which is how the owning
/// connection task learns it has been evicted.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub room_id: Uuid,
    pub identity: Identity,
    pub connected_at: DateTime<Utc>,
    tx: mpsc::Sender<Frame>,
}

impl Session {
    /// Create a session with a bounded outbound queue of `capacity` frames.
    pub fn new(room_id: Uuid, identity: Identity, capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let session = Self {
            id: SessionId::generate(),
            room_id,
            identity,
            connected_at: Utc::now(),
            tx,
        };
        (session, rx)
    }

    /// Enqueue without waiting. Fails when the queue is full or the receiver is gone.
    pub(crate) fn try_deliver(&self, frame: Frame) -> Result<(), mpsc::error::TrySendError<Frame>> {
        self.tx.try_send(frame)
    }
}
