use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use super::error::{JoinError, LeaveError, SendError};
use super::events::Envelope;
use super::services::Services;
use super::session::{Frame, Session, SessionId};
use crate::models::message::Message;
use crate::models::user::Identity;

/// Tracks which sessions are connected to which room and who is online there.
///
/// Every room has its own lock. Membership changes and the enqueueing of the
/// resulting broadcast happen under that lock, so all members of a room see
/// join/leave/message events in the same order. Enqueueing never waits: each
/// session owns a bounded outbound queue drained by its connection task, and a
/// session whose queue is full or closed is evicted on the spot.
pub struct RoomRegistry {
    rooms: DashMap<Uuid, Arc<Mutex<Room>>>,
    services: Services,
    max_message_len: usize,
}

#[derive(Default)]
struct Room {
    sessions: HashMap<SessionId, Session>,
    /// Identities with at least one live session, in order of arrival.
    online: Vec<OnlineEntry>,
    /// Set once the room has been removed from the map. Joiners holding a
    /// stale handle must retry.
    retired: bool,
}

struct OnlineEntry {
    identity: Identity,
    sessions: usize,
}

enum Refusal {
    RoomNotFound,
    AccessDenied,
}

impl From<Refusal> for JoinError {
    fn from(r: Refusal) -> Self {
        match r {
            Refusal::RoomNotFound => JoinError::RoomNotFound,
            Refusal::AccessDenied => JoinError::AccessDenied,
        }
    }
}

impl From<Refusal> for SendError {
    fn from(r: Refusal) -> Self {
        match r {
            Refusal::RoomNotFound => SendError::RoomNotFound,
            Refusal::AccessDenied => SendError::AccessDenied,
        }
    }
}

fn lock(room: &Mutex<Room>) -> MutexGuard<'_, Room> {
    room.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Room {
    fn admit(&mut self, session: Session) {
        match self
            .online
            .iter_mut()
            .find(|entry| entry.identity.id == session.identity.id)
        {
            Some(entry) => entry.sessions += 1,
            None => self.online.push(OnlineEntry {
                identity: session.identity.clone(),
                sessions: 1,
            }),
        }
        self.sessions.insert(session.id, session);
    }

    fn remove(&mut self, session_id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&session_id)?;
        if let Some(pos) = self
            .online
            .iter()
            .position(|entry| entry.identity.id == session.identity.id)
        {
            self.online[pos].sessions -= 1;
            if self.online[pos].sessions == 0 {
                self.online.remove(pos);
            }
        }
        Some(session)
    }

    fn roster(&self) -> Vec<Identity> {
        self.online.iter().map(|entry| entry.identity.clone()).collect()
    }

    /// Enqueue `envelope` for every session. Sessions that cannot take it are
    /// evicted and a `disconnect` for each of them is delivered to the rest.
    fn deliver(&mut self, room_id: Uuid, envelope: Envelope) {
        let mut pending = VecDeque::from([envelope]);

        while let Some(envelope) = pending.pop_front() {
            let frame: Frame = match envelope.encode() {
                Ok(text) => Arc::from(text),
                Err(e) => {
                    tracing::error!(%room_id, "failed to encode envelope: {e}");
                    continue;
                }
            };

            let stale: Vec<SessionId> = self
                .sessions
                .values()
                .filter_map(|session| match session.try_deliver(Arc::clone(&frame)) {
                    Ok(()) => None,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(%room_id, session_id = %session.id, "outbound queue full, evicting session");
                        Some(session.id)
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(%room_id, session_id = %session.id, "outbound queue closed, evicting session");
                        Some(session.id)
                    }
                })
                .collect();

            for session_id in stale {
                if let Some(session) = self.remove(session_id) {
                    pending.push_back(Envelope::disconnect(session.identity.clone(), self.roster()));
                }
            }
        }
    }

    /// Enqueue `envelope` for a single session, behind anything already queued
    /// for it. A session that cannot take it is evicted as in `deliver`.
    fn deliver_to(&mut self, room_id: Uuid, session_id: SessionId, envelope: Envelope) -> bool {
        let Some(session) = self.sessions.get(&session_id) else {
            return false;
        };
        let frame: Frame = match envelope.encode() {
            Ok(text) => Arc::from(text),
            Err(e) => {
                tracing::error!(%room_id, "failed to encode envelope: {e}");
                return false;
            }
        };
        if session.try_deliver(frame).is_ok() {
            return true;
        }

        tracing::warn!(%room_id, %session_id, "cannot enqueue for session, evicting");
        if let Some(session) = self.remove(session_id) {
            let roster = self.roster();
            self.deliver(room_id, Envelope::disconnect(session.identity, roster));
        }
        false
    }
}

impl RoomRegistry {
    pub fn new(services: Services, max_message_len: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            services,
            max_message_len,
        }
    }

    fn room(&self, room_id: &Uuid) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(room_id).map(|entry| Arc::clone(entry.value()))
    }

    async fn check_access(&self, room_id: Uuid, user_id: i64) -> Result<(), Refusal> {
        if !self.services.rooms.exists(room_id).await {
            return Err(Refusal::RoomNotFound);
        }
        if !self.services.access.can_access(room_id, user_id).await {
            return Err(Refusal::AccessDenied);
        }
        Ok(())
    }

    /// Drop the room from the map once its last session is gone. Must be
    /// called with the room's lock held.
    fn retire_if_empty(&self, room_id: Uuid, room: &Arc<Mutex<Room>>, guard: &mut Room) {
        if guard.sessions.is_empty() && !guard.retired {
            guard.retired = true;
            self.rooms.remove_if(&room_id, |_, current| Arc::ptr_eq(current, room));
            tracing::debug!(%room_id, "room retired");
        }
    }

    /// Register `session` in its room and broadcast a `connect` envelope to
    /// every member, the new session included.
    pub async fn join(&self, session: Session) -> Result<(), JoinError> {
        let room_id = session.room_id;
        self.check_access(room_id, session.identity.id).await?;

        loop {
            let room = Arc::clone(&self.rooms.entry(room_id).or_default());
            let mut guard = lock(&room);
            if guard.retired {
                continue;
            }
            if guard.sessions.contains_key(&session.id) {
                return Err(JoinError::AlreadyJoined);
            }

            let session_id = session.id;
            let identity = session.identity.clone();
            guard.admit(session);
            tracing::info!(
                %room_id,
                %session_id,
                user_id = identity.id,
                sessions = guard.sessions.len(),
                "session joined"
            );

            let roster = guard.roster();
            guard.deliver(room_id, Envelope::connect(identity, roster));
            self.retire_if_empty(room_id, &room, &mut guard);
            return Ok(());
        }
    }

    /// Deregister a session and broadcast a `disconnect` envelope to the
    /// remaining members. A second call for the same session is an error, not
    /// a state change.
    pub fn leave(&self, room_id: Uuid, session_id: SessionId) -> Result<(), LeaveError> {
        let room = self.room(&room_id).ok_or(LeaveError::SessionNotFound)?;
        let mut guard = lock(&room);
        let session = guard
            .remove(session_id)
            .ok_or(LeaveError::SessionNotFound)?;

        tracing::info!(
            %room_id,
            %session_id,
            user_id = session.identity.id,
            sessions = guard.sessions.len(),
            "session left"
        );

        let roster = guard.roster();
        guard.deliver(room_id, Envelope::disconnect(session.identity, roster));
        self.retire_if_empty(room_id, &room, &mut guard);
        Ok(())
    }

    /// Persist a message and fan it out to the room, sender included.
    /// Nothing is broadcast unless the store accepted the message.
    pub async fn send(&self, room_id: Uuid, from: &Identity, text: &str) -> Result<Message, SendError> {
        self.check_access(room_id, from.id).await?;

        if text.trim().is_empty() {
            return Err(SendError::InvalidMessage("message is empty".to_string()));
        }
        if text.chars().count() > self.max_message_len {
            return Err(SendError::InvalidMessage(format!(
                "message exceeds {} characters",
                self.max_message_len
            )));
        }

        let stored = self.services.store.persist(room_id, from.id, text).await?;
        self.broadcast_raw(room_id, Envelope::message(from.clone(), &stored));
        Ok(stored)
    }

    /// Deliver a prebuilt envelope to whoever is in the room right now.
    pub fn broadcast_raw(&self, room_id: Uuid, envelope: Envelope) {
        let Some(room) = self.room(&room_id) else {
            return;
        };
        let mut guard = lock(&room);
        if guard.retired {
            return;
        }
        guard.deliver(room_id, envelope);
        self.retire_if_empty(room_id, &room, &mut guard);
    }

    /// Queue an envelope for one session only. Returns false when the session
    /// is gone or had to be evicted.
    pub fn send_to_session(&self, room_id: Uuid, session_id: SessionId, envelope: Envelope) -> bool {
        let Some(room) = self.room(&room_id) else {
            return false;
        };
        let mut guard = lock(&room);
        if guard.retired {
            return false;
        }
        let delivered = guard.deliver_to(room_id, session_id, envelope);
        self.retire_if_empty(room_id, &room, &mut guard);
        delivered
    }

    pub fn online(&self, room_id: Uuid) -> Vec<Identity> {
        self.room(&room_id)
            .map(|room| lock(&room).roster())
            .unwrap_or_default()
    }

    pub fn session_count(&self, room_id: Uuid) -> usize {
        self.room(&room_id)
            .map(|room| lock(&room).sessions.len())
            .unwrap_or(0)
    }

    pub fn is_registered(&self, room_id: Uuid, session_id: SessionId) -> bool {
        self.room(&room_id)
            .map(|room| lock(&room).sessions.contains_key(&session_id))
            .unwrap_or(false)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
