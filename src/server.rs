//! Server assembly: listener binding, router composition and the
//! broadcaster task, tied together by one shutdown signal.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api;
use crate::app_state::AppState;
use crate::config::PushConfig;
use crate::domain::{FeedSource, RandomQuoteFeed, SubscriberRegistry};
use crate::error::PushError;
use crate::service::{BroadcastSettings, Broadcaster};
use crate::ws::handler::ws_handler;

/// Binds the TCP listener for the configured address.
///
/// # Errors
///
/// Returns [`PushError::TransportSetup`] if the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, PushError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| PushError::TransportSetup(format!("cannot bind {addr}: {e}")))
}

/// Composes the HTTP and WebSocket routes over `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the feed on `listener` until `shutdown` turns `true`.
///
/// Builds a [`RandomQuoteFeed`] from `config` and hands off to
/// [`serve_with_feed`].
///
/// # Errors
///
/// Same as [`serve_with_feed`].
pub async fn run(
    listener: TcpListener,
    config: PushConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<(), PushError> {
    config.validate()?;
    let feed: Arc<dyn FeedSource> = Arc::new(RandomQuoteFeed::new(
        config.feed_security_id.clone(),
        config.feed_price_min..=config.feed_price_max,
    ));
    serve_with_feed(listener, config, feed, shutdown).await
}

/// Serves samples from `feed` on `listener` until `shutdown` turns `true`.
///
/// Spawns the broadcaster, then serves connections. On shutdown the
/// broadcaster stops and clears the registry, every connection task sends a
/// close frame, and the HTTP server drains. If the broadcaster dies first,
/// the server drains the same way and reports the failure.
///
/// # Errors
///
/// Returns [`PushError::InvalidConfig`] if `config` does not validate,
/// [`PushError::TaskFailed`] if the broadcaster panicked and
/// [`PushError::TransportSetup`] if the server fails while serving.
pub async fn serve_with_feed(
    listener: TcpListener,
    config: PushConfig,
    feed: Arc<dyn FeedSource>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), PushError> {
    config.validate()?;

    let registry = Arc::new(SubscriberRegistry::new());
    let broadcaster = Broadcaster::new(
        Arc::clone(&registry),
        Arc::clone(&feed),
        BroadcastSettings::from(&config),
    );
    let broadcast_task = tokio::spawn(broadcaster.run(shutdown.clone()));
    let (stopped_tx, stopped_rx) = oneshot::channel::<()>();
    let supervisor = tokio::spawn(async move {
        let outcome = broadcast_task.await;
        let _ = stopped_tx.send(());
        outcome
    });

    let app = build_router(AppState::new(registry, feed, &config, shutdown.clone()));

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "server listening");
    }

    let mut graceful = shutdown;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = graceful.wait_for(|stop| *stop) => {}
                _ = stopped_rx => {}
            }
        })
        .await;

    let broadcast_outcome = match supervisor.await {
        Ok(joined) => joined,
        Err(e) => Err(e),
    };
    if let Err(e) = broadcast_outcome {
        error!(error = %e, "broadcaster task ended abnormally");
        return Err(PushError::TaskFailed(format!("broadcaster: {e}")));
    }
    served.map_err(|e| PushError::TransportSetup(e.to_string()))
}
