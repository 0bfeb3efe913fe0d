//! Type-safe subscriber identifier.
//!
//! [`SubscriberId`] is a newtype over `u64` so that subscriber ids cannot be
//! confused with positions, counts or other integers. Values are handed out
//! by [`super::SubscriberRegistry`] from a monotonically increasing counter
//! and are never reused.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one subscription.
///
/// Serialized as a bare JSON integer (`"connectionId": 3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Wraps a raw integer id, e.g. one received in an `unsubscribeFrom`
    /// message.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SubscriberId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&SubscriberId::from_raw(12)).ok();
        assert_eq!(json.as_deref(), Some("12"));
    }

    #[test]
    fn deserializes_from_integer() {
        let Ok(id) = serde_json::from_str::<SubscriberId>("5") else {
            panic!("deserialization failed");
        };
        assert_eq!(id.as_u64(), 5);
    }

    #[test]
    fn display_is_plain_number() {
        assert_eq!(format!("{}", SubscriberId::from(9)), "9");
    }
}
