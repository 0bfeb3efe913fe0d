//! Outbound side of a transport connection.
//!
//! The transport task owns the socket; everything else talks to it through
//! a [`ConnectionHandle`], a cheap clone of the sender half of the
//! connection's bounded outbound queue. Handing a payload to the queue is
//! the only thing a sender waits for: actual socket writes complete later
//! on the connection task, and a failed write ends that task, which closes
//! the queue and makes every further send fail.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{Semaphore, mpsc};

use crate::error::PushError;

/// Identifier of one transport connection (UUID v4).
///
/// Distinct from [`super::SubscriberId`]: a connection exists from accept to
/// close, a subscriber id only while that connection is subscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoded outbound payload, shared between all recipients of a broadcast.
pub type Payload = Arc<str>;

/// Non-owning reference to a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Payload>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiving end of its outbound queue.
    ///
    /// The receiver belongs to the transport task that writes to the socket.
    /// `capacity` is clamped to `1..=Semaphore::MAX_PERMITS`.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Payload>) {
        let (outbound, rx) = mpsc::channel(capacity.clamp(1, Semaphore::MAX_PERMITS));
        let handle = Self {
            id: ConnectionId::new(),
            outbound,
        };
        (handle, rx)
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` once the transport side has dropped its receiver.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Enqueues a payload for delivery, waiting at most `timeout` for room
    /// in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::SendFailure`] if the connection is closed or its
    /// queue stayed full for the whole timeout.
    pub async fn send(&self, payload: Payload, timeout: Duration) -> Result<(), PushError> {
        self.outbound
            .send_timeout(payload, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    PushError::SendFailure(format!("connection {} stalled", self.id))
                }
                SendTimeoutError::Closed(_) => {
                    PushError::SendFailure(format!("connection {} closed", self.id))
                }
            })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn send_reaches_receiver() {
        let (handle, mut rx) = ConnectionHandle::channel(4);
        let sent = handle.send(Arc::from("hello"), TIMEOUT).await;
        assert!(sent.is_ok());

        let Some(payload) = rx.recv().await else {
            panic!("expected payload");
        };
        assert_eq!(&*payload, "hello");
    }

    #[tokio::test]
    async fn send_to_dropped_receiver_fails() {
        let (handle, rx) = ConnectionHandle::channel(4);
        drop(rx);
        assert!(handle.is_closed());
        let result = handle.send(Arc::from("x"), TIMEOUT).await;
        assert!(matches!(result, Err(PushError::SendFailure(_))));
    }

    #[tokio::test]
    async fn send_to_full_queue_times_out() {
        let (handle, _rx) = ConnectionHandle::channel(1);
        assert!(handle.send(Arc::from("first"), TIMEOUT).await.is_ok());
        let result = handle.send(Arc::from("second"), TIMEOUT).await;
        let Err(PushError::SendFailure(msg)) = result else {
            panic!("expected send failure");
        };
        assert!(msg.contains("stalled"));
    }

    #[tokio::test]
    async fn oversized_capacity_is_clamped() {
        let (handle, mut rx) = ConnectionHandle::channel(usize::MAX);
        assert!(handle.send(Arc::from("x"), TIMEOUT).await.is_ok());
        assert!(rx.recv().await.is_some());
    }

    #[test]
    fn handles_get_distinct_connection_ids() {
        let (a, _rx_a) = ConnectionHandle::channel(1);
        let (b, _rx_b) = ConnectionHandle::channel(1);
        assert_ne!(a.id(), b.id());
    }
}
