//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unset or unparseable optional values
//! fall back to their defaults; values that parse but are out of range are
//! rejected so that startup fails loudly.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::error::PushError;

/// Longest accepted broadcast period (one day).
pub const MAX_BROADCAST_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Largest accepted outbound queue; tokio channels cannot hold more.
pub const MAX_OUTBOUND_BUFFER: usize = Semaphore::MAX_PERMITS;

/// Top-level server configuration.
///
/// Loaded once at startup via [`PushConfig::from_env`].
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Socket address to bind the WebSocket server to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// Period between broadcast ticks.
    pub broadcast_interval: Duration,

    /// Maximum number of sends in flight during one broadcast tick.
    pub broadcast_max_in_flight: usize,

    /// How long a single enqueue may wait on a full outbound queue.
    pub send_timeout: Duration,

    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,

    /// Security id stamped on every generated quote.
    pub feed_security_id: String,

    /// Lower bound (inclusive) of generated prices.
    pub feed_price_min: u64,

    /// Upper bound (inclusive) of generated prices.
    pub feed_price_max: u64,

    /// Send outbound JSON as binary frames instead of text frames.
    pub binary_frames: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            broadcast_interval: Duration::from_secs(5),
            broadcast_max_in_flight: 64,
            send_timeout: Duration::from_millis(1000),
            outbound_buffer: 32,
            feed_security_id: "100".to_string(),
            feed_price_min: 1,
            feed_price_max: 1000,
            binary_frames: false,
        }
    }
}

impl PushConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::TransportSetup`] if `LISTEN_ADDR` is set but
    /// cannot be parsed as a [`SocketAddr`], and
    /// [`PushError::InvalidConfig`] if a numeric setting is out of range.
    pub fn from_env() -> Result<Self, PushError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => parse_listen_addr(&raw)?,
            Err(_) => defaults.listen_addr,
        };

        let interval_secs = parse_env(
            "BROADCAST_INTERVAL_SECS",
            defaults.broadcast_interval.as_secs(),
        );
        let send_timeout_ms = parse_env(
            "SEND_TIMEOUT_MS",
            u64::try_from(defaults.send_timeout.as_millis()).unwrap_or(1000),
        );

        let config = Self {
            listen_addr,
            broadcast_interval: Duration::from_secs(interval_secs),
            broadcast_max_in_flight: parse_env(
                "BROADCAST_MAX_IN_FLIGHT",
                defaults.broadcast_max_in_flight,
            ),
            send_timeout: Duration::from_millis(send_timeout_ms),
            outbound_buffer: parse_env("OUTBOUND_BUFFER", defaults.outbound_buffer),
            feed_security_id: std::env::var("FEED_SECURITY_ID")
                .unwrap_or(defaults.feed_security_id),
            feed_price_min: parse_env("FEED_PRICE_MIN", defaults.feed_price_min),
            feed_price_max: parse_env("FEED_PRICE_MAX", defaults.feed_price_max),
            binary_frames: parse_env_bool("WS_BINARY_FRAMES", defaults.binary_frames),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every numeric setting is within its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::InvalidConfig`] naming the first offending
    /// setting.
    pub fn validate(&self) -> Result<(), PushError> {
        if self.broadcast_interval.is_zero() {
            return Err(PushError::InvalidConfig(
                "BROADCAST_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        if self.broadcast_interval > MAX_BROADCAST_INTERVAL
            || Instant::now().checked_add(self.broadcast_interval).is_none()
        {
            return Err(PushError::InvalidConfig(format!(
                "BROADCAST_INTERVAL_SECS must not exceed {}",
                MAX_BROADCAST_INTERVAL.as_secs()
            )));
        }
        if self.broadcast_max_in_flight == 0 {
            return Err(PushError::InvalidConfig(
                "BROADCAST_MAX_IN_FLIGHT must be greater than zero".to_string(),
            ));
        }
        if self.outbound_buffer == 0 || self.outbound_buffer > MAX_OUTBOUND_BUFFER {
            return Err(PushError::InvalidConfig(format!(
                "OUTBOUND_BUFFER must be between 1 and {MAX_OUTBOUND_BUFFER}"
            )));
        }
        if self.feed_price_min > self.feed_price_max {
            return Err(PushError::InvalidConfig(format!(
                "FEED_PRICE_MIN ({}) exceeds FEED_PRICE_MAX ({})",
                self.feed_price_min, self.feed_price_max
            )));
        }
        Ok(())
    }
}

/// Parses a listen address.
///
/// # Errors
///
/// Returns [`PushError::TransportSetup`] if `raw` is not a socket address.
pub fn parse_listen_addr(raw: &str) -> Result<SocketAddr, PushError> {
    raw.parse::<SocketAddr>()
        .map_err(|e| PushError::TransportSetup(format!("invalid LISTEN_ADDR {raw:?}: {e}")))
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw == "1" || raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw == "0" || raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
