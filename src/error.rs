//! Push server error types.
//!
//! [`PushError`] is the central error type. Only the startup variants
//! ([`PushError::TransportSetup`], [`PushError::InvalidConfig`]) are fatal;
//! everything else is scoped to a single message or a single send and is
//! logged where it happens.

use crate::domain::SubscriberId;

/// Server-side error enum.
///
/// # Categories
///
/// | Variant               | Scope        | Handling                        |
/// |-----------------------|--------------|---------------------------------|
/// | `TransportSetup`      | startup      | abort startup                   |
/// | `InvalidConfig`       | startup      | abort startup                   |
/// | `MalformedPayload`    | per message  | log, drop message               |
/// | `UnrecognizedMessage` | per message  | log, drop message               |
/// | `UnknownSubscriberId` | per message  | no-op, never sent to the client |
/// | `SendFailure`         | per send     | log, remove subscriber          |
/// | `Encode`              | per event    | log, skip event                 |
/// | `TaskFailed`          | server       | stop serving, return error      |
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The listen configuration is invalid or the listener could not bind.
    #[error("transport setup failed: {0}")]
    TransportSetup(String),

    /// A configuration value is out of its accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Inbound bytes are not a JSON object.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Inbound JSON object matches no known control message shape.
    #[error("unrecognized message: {0}")]
    UnrecognizedMessage(String),

    /// No subscriber is registered under the given id.
    #[error("unknown subscriber id: {0}")]
    UnknownSubscriberId(SubscriberId),

    /// A payload could not be handed to a connection's outbound queue.
    #[error("send failed: {0}")]
    SendFailure(String),

    /// An outbound event could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A background server task ended abnormally.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl PushError {
    /// Returns `true` for errors that must abort server startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportSetup(_) | Self::InvalidConfig(_))
    }
}
