//! # quote-push
//!
//! WebSocket push server that broadcasts periodic quote samples to every
//! subscribed client.
//!
//! Clients connect, receive `connect.connected`, send `{"subscribeTo": ..}`
//! and get back `connect.ack` with their subscriber id plus one immediate
//! `trading.quote`. From then on a quote is pushed to every subscriber on a
//! fixed period until the client sends `{"unsubscribeFrom": <id>}` or
//! disconnects.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)
//!     │
//!     ├── WS Handler / connection loop (ws/)
//!     ├── Message Router (ws/router)
//!     │
//!     ├── Broadcaster (service/)        ── FeedSource (domain/feed)
//!     │
//!     └── SubscriberRegistry (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod ws;
