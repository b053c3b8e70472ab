pub mod connection;
pub mod error;
pub mod events;
pub mod registry;
pub mod services;
pub mod session;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;
use connection::Transport;
use error::TransportError;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Browsers cannot set headers on a WebSocket handshake.
    pub token: Option<String>,
}

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or(query.token);
    let gateway = Arc::clone(&state.gateway);

    ws.on_upgrade(move |socket| async move {
        let reason = gateway.serve(chat_id, WsTransport(socket), credential).await;
        tracing::debug!(%chat_id, ?reason, "websocket closed");
    })
}

/// Adapts an axum WebSocket to the gateway's text-frame transport.
pub struct WsTransport(pub WebSocket);

#[async_trait]
impl Transport for WsTransport {
    async fn send_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        self.0
            .send(Message::Text(frame.to_owned().into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn recv_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.0.recv().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => {
                    if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                        return Ok(Some(text));
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // ping/pong are answered by axum
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        let _ = self.0.send(Message::Close(Some(frame))).await;
    }
}
