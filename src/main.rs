//! quote-push server entry point.
//!
//! Loads configuration, binds the listener and serves the feed until
//! Ctrl-C.

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use quote_push::config::PushConfig;
use quote_push::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = PushConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting quote-push");

    let listener = server::bind(config.listen_addr).await?;

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for ctrl-c; running until killed");
                std::future::pending::<()>().await;
            }
        }
    });

    server::run(listener, config, shutdown_rx).await?;
    tracing::info!("quote-push stopped");

    Ok(())
}
