//! Domain layer: subscriber identity, connection handles, the subscriber
//! registry and the feed source.

pub mod connection;
pub mod feed;
pub mod registry;
pub mod subscriber_id;

pub use connection::{ConnectionHandle, ConnectionId, Payload};
pub use feed::{FeedSource, QuoteSample, RandomQuoteFeed};
pub use registry::SubscriberRegistry;
pub use subscriber_id::SubscriberId;
