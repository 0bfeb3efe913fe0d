//! WebSocket layer: wire protocol, per-connection routing and the
//! connection loop.
//!
//! The feed is served at `/` and `/ws`. Every connection is greeted with
//! `connect.connected` and may then subscribe and unsubscribe at will.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod router;
