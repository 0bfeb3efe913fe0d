//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::PushConfig;
use crate::domain::{FeedSource, SubscriberRegistry};
use crate::ws::connection::FrameKind;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Subscriber registry shared with the broadcaster.
    pub registry: Arc<SubscriberRegistry>,
    /// Source of the immediate quote sent on subscribe.
    pub feed: Arc<dyn FeedSource>,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
    /// Frame type for outbound JSON.
    pub frames: FrameKind,
    /// Flips to `true` when the server is shutting down.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Builds the state from its shared parts and the relevant settings.
    #[must_use]
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        feed: Arc<dyn FeedSource>,
        config: &PushConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            feed,
            outbound_buffer: config.outbound_buffer,
            frames: if config.binary_frames {
                FrameKind::Binary
            } else {
                FrameKind::Text
            },
            shutdown,
        }
    }
}
