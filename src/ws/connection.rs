//! WebSocket connection loop.
//!
//! One task per connection. It greets the client, feeds inbound frames to
//! the [`MessageRouter`], writes the router's replies, drains the outbound
//! queue the broadcaster fills, and reconciles the registry when the
//! transport closes, fails or the server shuts down.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use super::messages::{ServerEvent, encode};
use super::router::MessageRouter;
use crate::app_state::AppState;
use crate::domain::ConnectionHandle;

/// WebSocket frame type used for outbound JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameKind {
    /// UTF-8 text frames.
    #[default]
    Text,
    /// Binary frames carrying UTF-8 JSON bytes.
    Binary,
}

impl FrameKind {
    /// Wraps an encoded payload in a frame of this kind.
    #[must_use]
    pub fn frame(self, payload: &str) -> Message {
        match self {
            Self::Text => Message::text(String::from(payload)),
            Self::Binary => Message::binary(Vec::from(payload.as_bytes())),
        }
    }
}

type WsSink = SplitSink<WebSocket, Message>;

/// Runs the read/write loop for a single WebSocket connection.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (handle, mut outbound_rx) = ConnectionHandle::channel(state.outbound_buffer);
    let connection_id = handle.id();
    let frames = state.frames;
    let mut shutdown = state.shutdown.clone();
    let mut router = MessageRouter::new(
        Arc::clone(&state.registry),
        Arc::clone(&state.feed),
        handle,
    );
    let (mut ws_tx, mut ws_rx) = socket.split();

    info!(%connection_id, "connection ready");
    let stopping = *shutdown.borrow_and_update();
    if stopping || !send_event(&mut ws_tx, frames, &ServerEvent::Connected).await {
        router.close().await;
        return;
    }

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                let replies = match msg {
                    Some(Ok(Message::Text(text))) => router.handle_bytes(text.as_str().as_bytes()).await,
                    Some(Ok(Message::Binary(bytes))) => router.handle_bytes(&bytes).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    // ping/pong answered by the transport
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(%connection_id, error = %e, "transport failed");
                        break;
                    }
                };
                if !send_all(&mut ws_tx, frames, &replies).await {
                    break;
                }
            }
            // Broadcast payload queued for this connection
            payload = outbound_rx.recv() => {
                let Some(payload) = payload else { break };
                if ws_tx.send(frames.frame(&payload)).await.is_err() {
                    break;
                }
            }
            // Server shutdown
            _ = shutdown.changed() => break,
        }
    }

    router.close().await;
    outbound_rx.close();
    let _ = ws_tx.send(Message::Close(None)).await;
    info!(%connection_id, "connection closed");
}

/// Writes `events` in order. Returns `false` once the socket is unusable.
async fn send_all(ws_tx: &mut WsSink, frames: FrameKind, events: &[ServerEvent]) -> bool {
    for event in events {
        if !send_event(ws_tx, frames, event).await {
            return false;
        }
    }
    true
}

/// Encodes and writes one event. Returns `false` if the socket write
/// failed; an encode failure only skips the event.
async fn send_event(ws_tx: &mut WsSink, frames: FrameKind, event: &ServerEvent) -> bool {
    let text = match encode(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(kind = event.kind(), error = %e, "skipping unencodable event");
            return true;
        }
    };
    match ws_tx.send(frames.frame(&text)).await {
        Ok(()) => true,
        Err(e) => {
            debug!(kind = event.kind(), error = %e, "socket write failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frames_carry_payload() {
        let Message::Text(text) = FrameKind::Text.frame("{\"t\":\"x\"}") else {
            unreachable!("text frame expected");
        };
        assert_eq!(text.as_str(), "{\"t\":\"x\"}");
    }

    #[test]
    fn binary_frames_carry_utf8_bytes() {
        let Message::Binary(bytes) = FrameKind::Binary.frame("{}") else {
            unreachable!("binary frame expected");
        };
        assert_eq!(bytes.as_ref(), b"{}");
    }
}
