//! Periodic fan-out of feed samples to every subscriber.
//!
//! Each tick walks a registry snapshot with `for_each`, generates one
//! sample, encodes it once and hands the shared payload to every
//! subscriber's outbound queue.
//! At most `max_in_flight` enqueues run at once and each may wait at most
//! `send_timeout`, so a stalled client costs the tick a bounded delay and
//! is then dropped like a closed one.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{StreamExt, stream};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::config::{MAX_BROADCAST_INTERVAL, PushConfig};
use crate::domain::{FeedSource, Payload, SubscriberId, SubscriberRegistry};
use crate::error::PushError;
use crate::ws::messages::{ServerEvent, encode};

/// Timing and concurrency limits for the broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastSettings {
    /// Period between ticks.
    pub period: Duration,
    /// Maximum concurrent enqueues per tick.
    pub max_in_flight: usize,
    /// Maximum wait per enqueue.
    pub send_timeout: Duration,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self::from(&PushConfig::default())
    }
}

impl From<&PushConfig> for BroadcastSettings {
    fn from(config: &PushConfig) -> Self {
        Self {
            period: config.broadcast_interval,
            max_in_flight: config.broadcast_max_in_flight,
            send_timeout: config.send_timeout,
        }
    }
}

/// Outcome of one broadcast tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Payloads handed to a subscriber's queue.
    pub sent: usize,
    /// Subscribers dropped because their send failed.
    pub failed: usize,
}

/// Pushes a fresh sample to all subscribers on a fixed period.
#[derive(Debug)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    feed: Arc<dyn FeedSource>,
    settings: BroadcastSettings,
}

impl Broadcaster {
    /// Creates a broadcaster over `registry` fed by `feed`.
    ///
    /// Zero limits are raised to the smallest usable value and the period
    /// is capped at [`MAX_BROADCAST_INTERVAL`].
    #[must_use]
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        feed: Arc<dyn FeedSource>,
        settings: BroadcastSettings,
    ) -> Self {
        let settings = BroadcastSettings {
            period: settings
                .period
                .clamp(Duration::from_millis(1), MAX_BROADCAST_INTERVAL),
            max_in_flight: settings.max_in_flight.max(1),
            send_timeout: settings.send_timeout,
        };
        Self {
            registry,
            feed,
            settings,
        }
    }

    /// Returns the effective settings.
    #[must_use]
    pub const fn settings(&self) -> BroadcastSettings {
        self.settings
    }

    /// Runs one broadcast cycle.
    ///
    /// With no subscribers nothing is generated or sent. Subscribers whose
    /// send fails are unregistered; the others are unaffected.
    pub async fn tick(&self) -> TickReport {
        let mut subscribers = Vec::new();
        self.registry
            .for_each(|id, connection| subscribers.push((id, connection)))
            .await;
        if subscribers.is_empty() {
            trace!("no subscribers; tick skipped");
            return TickReport::default();
        }

        let event = ServerEvent::quote(self.feed.generate_sample());
        let payload: Payload = match encode(&event) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                error!(error = %e, "failed to encode quote");
                return TickReport::default();
            }
        };

        let send_timeout = self.settings.send_timeout;
        let outcomes: Vec<(SubscriberId, Result<(), PushError>)> = stream::iter(subscribers)
            .map(|(id, connection)| {
                let payload = Arc::clone(&payload);
                async move { (id, connection.send(payload, send_timeout).await) }
            })
            .buffer_unordered(self.settings.max_in_flight)
            .collect()
            .await;

        let mut report = TickReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.sent = report.sent.saturating_add(1),
                Err(e) => {
                    warn!(subscriber_id = %id, error = %e, "dropping subscriber after failed send");
                    self.registry.unregister(id).await;
                    report.failed = report.failed.saturating_add(1);
                }
            }
        }
        debug!(sent = report.sent, failed = report.failed, "broadcast tick");
        report
    }

    /// Ticks every period until `shutdown` turns `true` (or its sender is
    /// dropped), then releases every subscriber.
    ///
    /// The first tick fires one full period after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.settings.period;
        let now = Instant::now();
        let first = now.checked_add(period).unwrap_or(now);
        let mut ticker = tokio::time::interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(?period, "broadcaster started");

        let already_stopping = *shutdown.borrow_and_update();
        if already_stopping {
            self.registry.clear().await;
            return;
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let released = self.registry.clear().await;
        info!(released, "broadcaster stopped");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::{ConnectionHandle, QuoteSample, RandomQuoteFeed};

    #[derive(Debug)]
    struct FixedFeed;

    impl FeedSource for FixedFeed {
        fn generate_sample(&self) -> QuoteSample {
            QuoteSample {
                security_id: "100".to_string(),
                current_price: "250".to_string(),
            }
        }
    }

    fn settings() -> BroadcastSettings {
        BroadcastSettings {
            period: Duration::from_millis(20),
            max_in_flight: 4,
            send_timeout: Duration::from_millis(50),
        }
    }

    fn broadcaster(registry: &Arc<SubscriberRegistry>) -> Broadcaster {
        Broadcaster::new(Arc::clone(registry), Arc::new(FixedFeed), settings())
    }

    async fn subscribe(
        registry: &SubscriberRegistry,
        capacity: usize,
    ) -> (SubscriberId, mpsc::Receiver<Payload>) {
        let (handle, rx) = ConnectionHandle::channel(capacity);
        (registry.register(handle).await, rx)
    }

    #[tokio::test]
    async fn empty_registry_sends_nothing() {
        let registry = Arc::new(SubscriberRegistry::new());
        let report = broadcaster(&registry).tick().await;
        assert_eq!(report, TickReport::default());
    }

    #[tokio::test]
    async fn every_subscriber_gets_exactly_one_quote() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut receivers = Vec::new();
        for _ in 0..10 {
            receivers.push(subscribe(&registry, 4).await.1);
        }

        let report = broadcaster(&registry).tick().await;
        assert_eq!(report, TickReport { sent: 10, failed: 0 });

        for rx in &mut receivers {
            let Ok(payload) = rx.try_recv() else {
                panic!("subscriber missed the quote");
            };
            let Ok(ServerEvent::Quote { body }) = serde_json::from_str::<ServerEvent>(&payload)
            else {
                panic!("not a quote: {payload}");
            };
            assert_eq!(body.current_price, "250");
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn all_subscribers_share_the_same_sample() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (_, mut rx_a) = subscribe(&registry, 4).await;
        let (_, mut rx_b) = subscribe(&registry, 4).await;
        let b = Broadcaster::new(
            Arc::clone(&registry),
            Arc::new(RandomQuoteFeed::default()),
            settings(),
        );

        b.tick().await;
        let (Ok(a), Ok(bb)) = (rx_a.try_recv(), rx_b.try_recv()) else {
            panic!("both subscribers should receive");
        };
        assert_eq!(a, bb);
    }

    #[tokio::test]
    async fn closed_connection_is_dropped_others_unaffected() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (dead_id, dead_rx) = subscribe(&registry, 4).await;
        let (live_id, mut live_rx) = subscribe(&registry, 4).await;
        drop(dead_rx);

        let b = broadcaster(&registry);
        let report = b.tick().await;
        assert_eq!(report, TickReport { sent: 1, failed: 1 });
        assert!(!registry.contains(dead_id).await);
        assert!(registry.contains(live_id).await);
        assert!(live_rx.try_recv().is_ok());

        let report = b.tick().await;
        assert_eq!(report, TickReport { sent: 1, failed: 0 });
    }

    #[tokio::test]
    async fn stalled_connection_is_dropped_after_timeout() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (stalled_id, _stalled_rx) = subscribe(&registry, 1).await;
        let (_, mut live_rx) = subscribe(&registry, 8).await;
        let b = broadcaster(&registry);

        // First tick fills the stalled queue, second one times out on it.
        assert_eq!(b.tick().await.failed, 0);
        let report = b.tick().await;
        assert_eq!(report, TickReport { sent: 1, failed: 1 });
        assert!(!registry.contains(stalled_id).await);
        assert!(live_rx.try_recv().is_ok());
        assert!(live_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn oversized_period_is_capped() {
        let registry = Arc::new(SubscriberRegistry::new());
        let b = Broadcaster::new(
            Arc::clone(&registry),
            Arc::new(FixedFeed),
            BroadcastSettings {
                period: Duration::from_secs(u64::MAX),
                ..settings()
            },
        );
        assert_eq!(b.settings().period, MAX_BROADCAST_INTERVAL);

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(b.run(stop_rx));
        assert!(stop_tx.send(true).is_ok());
        let joined = tokio::time::timeout(Duration::from_secs(2), task).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn zero_limits_are_clamped() {
        let registry = Arc::new(SubscriberRegistry::new());
        let b = Broadcaster::new(
            registry,
            Arc::new(FixedFeed),
            BroadcastSettings {
                period: Duration::ZERO,
                max_in_flight: 0,
                send_timeout: Duration::from_millis(10),
            },
        );
        assert_eq!(b.settings().max_in_flight, 1);
        assert!(!b.settings().period.is_zero());
    }

    #[tokio::test]
    async fn run_ticks_until_shutdown_then_releases_subscribers() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (_, mut rx) = subscribe(&registry, 16).await;
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(broadcaster(&registry).run(stop_rx));

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(received, Ok(Some(_))));

        assert!(stop_tx.send(true).is_ok());
        let joined = tokio::time::timeout(Duration::from_secs(2), task).await;
        assert!(matches!(joined, Ok(Ok(()))));
        assert!(registry.is_empty().await);
    }
}
