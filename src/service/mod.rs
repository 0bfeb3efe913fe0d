//! Service layer: the periodic broadcaster.

pub mod broadcaster;

pub use broadcaster::{BroadcastSettings, Broadcaster, TickReport};
