use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::error::{AuthError, JoinError, SendError, TransportError};
use super::events::{close_code, ClientAction, ClientFrame, Envelope};
use super::registry::RoomRegistry;
use super::services::Authenticator;
use super::session::{Session, SessionId};
use crate::config::GatewaySettings;
use crate::models::message::Message;
use crate::models::user::Identity;

/// A duplex text-frame channel. Handshake and encryption belong to whoever
/// builds the transport.
///
/// `recv_frame` must be cancel-safe: the connection loop races it against
/// outbound traffic and may drop it before it completes.
#[async_trait]
pub trait Transport: Send {
    async fn send_frame(&mut self, frame: &str) -> Result<(), TransportError>;
    /// `Ok(None)` means the peer closed the connection.
    async fn recv_frame(&mut self) -> Result<Option<String>, TransportError>;
    async fn close(&mut self, code: u16, reason: &str);
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    AuthFailed(AuthError),
    JoinRefused(JoinError),
    ClientClosed,
    TransportFailed(TransportError),
    /// The registry dropped the session because it could not keep up.
    Evicted,
}

/// Runs one connection from accept to close against a shared registry.
pub struct Gateway {
    authenticator: Arc<dyn Authenticator>,
    registry: Arc<RoomRegistry>,
    settings: GatewaySettings,
}

/// Deregisters the session when the connection task finishes or is cancelled.
struct LeaveGuard<'a> {
    registry: &'a RoomRegistry,
    room_id: Uuid,
    session_id: SessionId,
}

impl Drop for LeaveGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.registry.leave(self.room_id, self.session_id) {
            // Already evicted by a broadcast; nothing left to clean up.
            tracing::debug!(room_id = %self.room_id, session_id = %self.session_id, "leave on close: {e}");
        }
    }
}

impl Gateway {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        registry: Arc<RoomRegistry>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            authenticator,
            registry,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Authenticate, join `room_id`, then pump frames both ways until the
    /// connection closes. Returns only once the session is fully deregistered.
    pub async fn serve<T: Transport>(
        &self,
        room_id: Uuid,
        mut transport: T,
        credential: Option<String>,
    ) -> CloseReason {
        // Connecting
        let identity = match self.authenticate(credential.as_deref()).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!(%room_id, "websocket auth failed: {e}");
                transport.close(close_code::AUTH_FAILED, &e.to_string()).await;
                return CloseReason::AuthFailed(e);
            }
        };

        // Authenticated
        let (session, mut outbound) = Session::new(room_id, identity.clone(), self.settings.send_queue);
        let session_id = session.id;
        if let Err(e) = self.registry.join(session).await {
            let code = match e {
                JoinError::RoomNotFound => close_code::ROOM_NOT_FOUND,
                JoinError::AccessDenied => close_code::ACCESS_DENIED,
                JoinError::AlreadyJoined => close_code::INTERNAL_ERROR,
            };
            tracing::debug!(%room_id, user_id = identity.id, "join refused: {e}");
            transport.close(code, &e.to_string()).await;
            return CloseReason::JoinRefused(e);
        }

        // Joined
        let _guard = LeaveGuard {
            registry: &self.registry,
            room_id,
            session_id,
        };

        // At most one send in flight. Inbound reads pause until it settles, the
        // outbound queue keeps draining.
        let mut in_flight: Option<PendingSend> = None;

        loop {
            tokio::select! {
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        transport.close(close_code::EVICTED, "too slow").await;
                        return CloseReason::Evicted;
                    };
                    if let Err(e) = self.write(&mut transport, &frame).await {
                        tracing::debug!(%room_id, %session_id, "write failed: {e}");
                        return CloseReason::TransportFailed(e);
                    }
                }
                result = settle(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    if let Err(e) = result {
                        self.reject_send(room_id, session_id, &identity, e);
                    }
                }
                inbound = transport.recv_frame(), if in_flight.is_none() => {
                    match inbound {
                        Ok(Some(raw)) => {
                            if let ClientAction::Send(text) = ClientFrame::parse(&raw) {
                                let registry = Arc::clone(&self.registry);
                                let author = identity.clone();
                                in_flight = Some(Box::pin(async move {
                                    registry.send(room_id, &author, &text).await
                                }));
                            }
                        }
                        Ok(None) => return CloseReason::ClientClosed,
                        Err(e) => {
                            tracing::debug!(%room_id, %session_id, "read failed: {e}");
                            return CloseReason::TransportFailed(e);
                        }
                    }
                }
            }
        }
    }

    async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        match credential.map(str::trim) {
            Some(c) if !c.is_empty() => self.authenticator.verify(c).await,
            _ => Err(AuthError::MissingCredential),
        }
    }

    async fn write<T: Transport>(&self, transport: &mut T, frame: &str) -> Result<(), TransportError> {
        match tokio::time::timeout(self.settings.write_timeout, transport.send_frame(frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// A failed send is reported to the sender only, queued behind whatever
    /// the room already sent it.
    fn reject_send(&self, room_id: Uuid, session_id: SessionId, identity: &Identity, e: SendError) {
        let reason = match e {
            SendError::Store(e) => {
                tracing::error!(%room_id, user_id = identity.id, "failed to persist message: {e}");
                "message could not be saved".to_string()
            }
            e => e.to_string(),
        };
        if !self.registry.send_to_session(room_id, session_id, Envelope::error(reason)) {
            tracing::debug!(%room_id, %session_id, "session gone before error could be queued");
        }
    }
}

type PendingSend = Pin<Box<dyn Future<Output = Result<Message, SendError>> + Send>>;

async fn settle(in_flight: &mut Option<PendingSend>) -> Result<Message, SendError> {
    match in_flight {
        Some(send) => send.await,
        None => std::future::pending().await,
    }
}
