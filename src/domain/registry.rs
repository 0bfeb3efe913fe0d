//! Concurrent subscriber storage.
//!
//! [`SubscriberRegistry`] is the single piece of shared mutable state in the
//! server. Connection tasks register and unregister through it and the
//! broadcaster reads snapshots of it; all of that is serialized by one
//! [`tokio::sync::RwLock`] around a `HashMap` keyed by [`SubscriberId`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::{ConnectionHandle, ConnectionId, SubscriberId};

/// Registry of subscribed connections.
///
/// # Concurrency
///
/// - Mutations take the write lock; ids are allocated while holding it, so
///   id order matches insertion order.
/// - Readers copy the entries out under the read lock ([`Self::snapshot`])
///   and send outside of it. A send may therefore reach a subscriber that
///   was removed after the snapshot was taken, but never one whose
///   registration has not completed.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<SubscriberId, ConnectionHandle>>,
}

impl SubscriberRegistry {
    /// Creates an empty registry. The first id handed out is `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `connection` under a freshly allocated id and returns the id.
    pub async fn register(&self, connection: ConnectionHandle) -> SubscriberId {
        let mut map = self.subscribers.write().await;
        let id = SubscriberId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        map.insert(id, connection);
        id
    }

    /// Removes the entry for `id`, returning its connection.
    ///
    /// Returns `None` if the id is unknown or was already removed.
    pub async fn unregister(&self, id: SubscriberId) -> Option<ConnectionHandle> {
        self.subscribers.write().await.remove(&id)
    }

    /// Removes every entry that belongs to the given transport connection.
    ///
    /// Used when the transport reports the connection closed or failed.
    pub async fn remove_connection(&self, connection: ConnectionId) -> Vec<SubscriberId> {
        let mut map = self.subscribers.write().await;
        let stale: Vec<SubscriberId> = map
            .iter()
            .filter(|(_, handle)| handle.id() == connection)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            map.remove(id);
        }
        stale
    }

    /// Returns `true` if `id` is currently registered.
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(&id)
    }

    /// Copies all current entries out of the registry.
    pub async fn snapshot(&self) -> Vec<(SubscriberId, ConnectionHandle)> {
        let map = self.subscribers.read().await;
        map.iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }

    /// Applies `f` to every entry of a consistent snapshot.
    ///
    /// The lock is released before `f` runs, so `f` may itself call back
    /// into the registry or keep the handle for a later send.
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(SubscriberId, ConnectionHandle),
    {
        for (id, handle) in self.snapshot().await {
            f(id, handle);
        }
    }

    /// Drops every entry, returning how many were removed.
    pub async fn clear(&self) -> usize {
        let mut map = self.subscribers.write().await;
        let removed = map.len();
        map.clear();
        removed
    }

    /// Returns the number of registered subscribers.
    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Returns `true` if nobody is subscribed.
    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }
}
