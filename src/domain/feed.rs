//! Feed value source.
//!
//! The broadcaster only needs "give me the next sample"; [`FeedSource`] is
//! that seam. [`RandomQuoteFeed`] is the built-in stand-in that prices a
//! fixed security id uniformly at random, and a real market-data adapter
//! can replace it without touching the broadcaster.

use std::fmt;
use std::ops::RangeInclusive;

use rand::Rng;

/// One unit of feed data.
///
/// The price is carried as a string, as it is on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSample {
    /// Security the price belongs to.
    pub security_id: String,
    /// Current price, string-encoded.
    pub current_price: String,
}

/// Producer of feed samples.
pub trait FeedSource: Send + Sync + fmt::Debug {
    /// Produces the next sample.
    fn generate_sample(&self) -> QuoteSample;
}

/// Random integer prices in a fixed range for a fixed security id.
#[derive(Debug, Clone)]
pub struct RandomQuoteFeed {
    security_id: String,
    prices: RangeInclusive<u64>,
}

impl RandomQuoteFeed {
    /// Creates a feed for `security_id` pricing within `prices`.
    ///
    /// An empty range is normalized to the single value of its start.
    #[must_use]
    pub fn new(security_id: impl Into<String>, prices: RangeInclusive<u64>) -> Self {
        let prices = if prices.is_empty() {
            *prices.start()..=*prices.start()
        } else {
            prices
        };
        Self {
            security_id: security_id.into(),
            prices,
        }
    }
}

impl Default for RandomQuoteFeed {
    fn default() -> Self {
        Self::new("100", 1..=1000)
    }
}

impl FeedSource for RandomQuoteFeed {
    fn generate_sample(&self) -> QuoteSample {
        let price = rand::thread_rng().gen_range(self.prices.clone());
        QuoteSample {
            security_id: self.security_id.clone(),
            current_price: price.to_string(),
        }
    }
}
