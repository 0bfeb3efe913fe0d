//! Per-connection control message state machine.
//!
//! ```text
//! Unsubscribed ──Subscribe──▶ Subscribed(id) ──Unsubscribe{id}──▶ Unsubscribed
//!        └──────────────┬───────────┘
//!                     close
//!                       ▼
//!                    Closed
//! ```
//!
//! The router never writes to the socket itself: it returns the events the
//! connection task must send back on the same connection.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::messages::{ControlMessage, ServerEvent, decode};
use crate::domain::{ConnectionHandle, FeedSource, SubscriberId, SubscriberRegistry};
use crate::error::PushError;

/// Subscription state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected but not receiving broadcasts.
    Unsubscribed,
    /// Registered under the given id.
    Subscribed(SubscriberId),
    /// Transport closed; terminal.
    Closed,
}

/// Drives registry mutations from one connection's inbound messages.
#[derive(Debug)]
pub struct MessageRouter {
    registry: Arc<SubscriberRegistry>,
    feed: Arc<dyn FeedSource>,
    connection: ConnectionHandle,
    state: SessionState,
}

impl MessageRouter {
    /// Creates a router for `connection`, initially unsubscribed.
    #[must_use]
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        feed: Arc<dyn FeedSource>,
        connection: ConnectionHandle,
    ) -> Self {
        Self {
            registry,
            feed,
            connection,
            state: SessionState::Unsubscribed,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Decodes and dispatches one inbound message.
    ///
    /// Malformed or unrecognized messages are logged and dropped; the state
    /// is left untouched and no reply is produced.
    pub async fn handle_bytes(&mut self, bytes: &[u8]) -> Vec<ServerEvent> {
        match decode(bytes) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => {
                warn!(connection_id = %self.connection.id(), error = %e, "dropping inbound message");
                Vec::new()
            }
        }
    }

    /// Applies a decoded control message and returns the replies for this
    /// connection, in order.
    pub async fn dispatch(&mut self, message: ControlMessage) -> Vec<ServerEvent> {
        if self.state == SessionState::Closed {
            debug!(connection_id = %self.connection.id(), "message after close ignored");
            return Vec::new();
        }
        match message {
            ControlMessage::Subscribe => self.subscribe().await,
            ControlMessage::Unsubscribe { id } => {
                self.unsubscribe(id).await;
                Vec::new()
            }
        }
    }

    async fn subscribe(&mut self) -> Vec<ServerEvent> {
        // A repeated subscribe re-acks the live id instead of registering
        // twice. If the id was removed behind our back (another client
        // unsubscribed it, or a send failed) a fresh one is issued.
        if let SessionState::Subscribed(id) = self.state
            && self.registry.contains(id).await
        {
            debug!(connection_id = %self.connection.id(), subscriber_id = %id, "already subscribed");
            return vec![ServerEvent::Ack { connection_id: id }];
        }

        let id = self.registry.register(self.connection.clone()).await;
        self.state = SessionState::Subscribed(id);
        info!(connection_id = %self.connection.id(), subscriber_id = %id, "subscribed");

        vec![
            ServerEvent::Ack { connection_id: id },
            ServerEvent::quote(self.feed.generate_sample()),
        ]
    }

    async fn unsubscribe(&mut self, id: SubscriberId) {
        match self.registry.unregister(id).await {
            Some(owner) => {
                info!(
                    connection_id = %self.connection.id(),
                    owner = %owner.id(),
                    subscriber_id = %id,
                    "unsubscribed"
                );
            }
            None => {
                debug!(
                    connection_id = %self.connection.id(),
                    error = %PushError::UnknownSubscriberId(id),
                    "unsubscribe ignored"
                );
            }
        }
        if self.state == SessionState::Subscribed(id) {
            self.state = SessionState::Unsubscribed;
        }
    }

    /// Marks the connection closed and removes whatever it still has
    /// registered. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let removed = self.registry.remove_connection(self.connection.id()).await;
        if !removed.is_empty() {
            debug!(connection_id = %self.connection.id(), removed = removed.len(), "reconciled on close");
        }
        self.state = SessionState::Closed;
    }
}
