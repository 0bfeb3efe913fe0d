//! Wire protocol: inbound control messages and outbound server events.
//!
//! One JSON object per WebSocket message. Inbound messages are told apart
//! by which field is present; outbound events carry a `t` tag.
//!
//! ```text
//! client → server   {"subscribeTo": <any>}
//!                   {"unsubscribeFrom": <int>}
//! server → client   {"t":"connect.connected"}
//!                   {"t":"connect.ack","connectionId":<int>}
//!                   {"t":"trading.quote","body":{"securityId":"..","currentPrice":".."}}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{QuoteSample, SubscriberId};
use crate::error::PushError;

/// Control message sent by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Join the feed. The value of `subscribeTo` is ignored.
    Subscribe,
    /// Leave the feed under the given subscriber id.
    Unsubscribe {
        /// Id previously returned in `connect.ack`.
        id: SubscriberId,
    },
}

/// Body of a `trading.quote` event. Prices travel as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBody {
    /// Security identifier.
    pub security_id: String,
    /// Current price.
    pub current_price: String,
}

/// Event sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ServerEvent {
    /// Sent once when the transport is ready.
    #[serde(rename = "connect.connected")]
    Connected,
    /// Confirms a subscription and carries its id.
    #[serde(rename = "connect.ack")]
    Ack {
        /// Assigned subscriber id.
        #[serde(rename = "connectionId")]
        connection_id: SubscriberId,
    },
    /// One feed sample.
    #[serde(rename = "trading.quote")]
    Quote {
        /// Quote payload.
        body: QuoteBody,
    },
}

impl ServerEvent {
    /// Wraps a feed sample in a `trading.quote` event.
    #[must_use]
    pub fn quote(sample: QuoteSample) -> Self {
        Self::Quote {
            body: QuoteBody {
                security_id: sample.security_id,
                current_price: sample.current_price,
            },
        }
    }

    /// Returns the `t` tag of this event, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connected => "connect.connected",
            Self::Ack { .. } => "connect.ack",
            Self::Quote { .. } => "trading.quote",
        }
    }
}

/// Parses one inbound message.
///
/// `subscribeTo` wins if both fields are present.
///
/// # Errors
///
/// Returns [`PushError::MalformedPayload`] if `bytes` is not a JSON object
/// and [`PushError::UnrecognizedMessage`] if the object has neither known
/// field, or `unsubscribeFrom` is not a non-negative integer.
pub fn decode(bytes: &[u8]) -> Result<ControlMessage, PushError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| PushError::MalformedPayload(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(PushError::MalformedPayload(
            "expected a JSON object".to_string(),
        ));
    };

    if object.contains_key("subscribeTo") {
        return Ok(ControlMessage::Subscribe);
    }
    if let Some(raw) = object.get("unsubscribeFrom") {
        return raw
            .as_u64()
            .map(|id| ControlMessage::Unsubscribe {
                id: SubscriberId::from_raw(id),
            })
            .ok_or_else(|| {
                PushError::UnrecognizedMessage(format!(
                    "unsubscribeFrom expects a non-negative integer, got {raw}"
                ))
            });
    }
    Err(PushError::UnrecognizedMessage(
        "neither subscribeTo nor unsubscribeFrom present".to_string(),
    ))
}

/// Serializes an outbound event to its JSON text.
///
/// # Errors
///
/// Returns [`PushError::Encode`] if serialization fails, which does not
/// happen for events built by this crate.
pub fn encode(event: &ServerEvent) -> Result<String, PushError> {
    Ok(serde_json::to_string(event)?)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn encoded(event: &ServerEvent) -> serde_json::Value {
        let Ok(text) = encode(event) else {
            panic!("encode failed");
        };
        let Ok(value) = serde_json::from_str(&text) else {
            panic!("encode produced invalid JSON: {text}");
        };
        value
    }

    #[test]
    fn subscribe_accepts_any_value() {
        for raw in [
            r#"{"subscribeTo": true}"#,
            r#"{"subscribeTo": "trading"}"#,
            r#"{"subscribeTo": null}"#,
            r#"{"subscribeTo": {"feed": 1}}"#,
        ] {
            assert!(matches!(
                decode(raw.as_bytes()),
                Ok(ControlMessage::Subscribe)
            ));
        }
    }

    #[test]
    fn unsubscribe_carries_id() {
        let decoded = decode(br#"{"unsubscribeFrom": 3}"#);
        let Ok(ControlMessage::Unsubscribe { id }) = decoded else {
            panic!("expected unsubscribe, got {decoded:?}");
        };
        assert_eq!(id, SubscriberId::from_raw(3));
    }

    #[test]
    fn unsubscribe_with_non_integer_is_unrecognized() {
        for raw in [
            r#"{"unsubscribeFrom": "3"}"#,
            r#"{"unsubscribeFrom": -1}"#,
            r#"{"unsubscribeFrom": 1.5}"#,
        ] {
            assert!(matches!(
                decode(raw.as_bytes()),
                Err(PushError::UnrecognizedMessage(_))
            ));
        }
    }

    #[test]
    fn subscribe_takes_precedence() {
        let decoded = decode(br#"{"unsubscribeFrom": 0, "subscribeTo": 1}"#);
        assert!(matches!(decoded, Ok(ControlMessage::Subscribe)));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            decode(b"not json"),
            Err(PushError::MalformedPayload(_))
        ));
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(matches!(
            decode(b"[1,2,3]"),
            Err(PushError::MalformedPayload(_))
        ));
    }

    #[test]
    fn unknown_object_is_unrecognized() {
        assert!(matches!(
            decode(br#"{"ping": true}"#),
            Err(PushError::UnrecognizedMessage(_))
        ));
    }

    #[test]
    fn connected_wire_shape() {
        assert_eq!(
            encoded(&ServerEvent::Connected),
            serde_json::json!({"t": "connect.connected"})
        );
    }

    #[test]
    fn ack_wire_shape() {
        let event = ServerEvent::Ack {
            connection_id: SubscriberId::from_raw(0),
        };
        assert_eq!(
            encoded(&event),
            serde_json::json!({"t": "connect.ack", "connectionId": 0})
        );
    }

    #[test]
    fn quote_wire_shape() {
        let event = ServerEvent::quote(QuoteSample {
            security_id: "100".to_string(),
            current_price: "512".to_string(),
        });
        assert_eq!(
            encoded(&event),
            serde_json::json!({
                "t": "trading.quote",
                "body": {"securityId": "100", "currentPrice": "512"}
            })
        );
    }

    #[test]
    fn client_recovers_quote_pair() {
        let event = ServerEvent::quote(QuoteSample {
            security_id: "100".to_string(),
            current_price: "77".to_string(),
        });
        let Ok(text) = encode(&event) else {
            panic!("encode failed");
        };
        let Ok(ServerEvent::Quote { body }) = serde_json::from_str::<ServerEvent>(&text) else {
            panic!("client could not decode {text}");
        };
        assert_eq!(
            (body.security_id.as_str(), body.current_price.as_str()),
            ("100", "77")
        );
    }

    #[test]
    fn kind_matches_tag() {
        assert_eq!(ServerEvent::Connected.kind(), "connect.connected");
        let ack = ServerEvent::Ack {
            connection_id: SubscriberId::from_raw(1),
        };
        assert_eq!(ack.kind(), "connect.ack");
    }
}
