//! Error types for the session core.
//!
//! Errors fall into four families:
//!
//! - transport failures, fatal to the session ([`TransportError`]),
//! - decode failures, local to one message,
//! - command errors returned by the node for one request,
//! - `NotConnected`, returned without blocking before connect or after teardown.

use std::time::Duration;

/// Transport-level errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed, locally or by the peer.
    #[error("transport closed")]
    Closed,

    /// A read or write did not finish before its deadline.
    #[error("{op} deadline exceeded after {after:?}")]
    Timeout {
        /// `"read"` or `"write"`.
        op: &'static str,
        after: Duration,
    },

    /// Establishing the connection failed.
    #[error("dial failed: {0}")]
    Dial(String),

    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::Closed,
            other => Self::WebSocket(other.to_string()),
        }
    }
}

/// Errors surfaced to callers of a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    /// The session is not connected (never connected, or already torn down).
    #[error("websocket not connected")]
    NotConnected,

    /// The session closed while the command was pending.
    #[error("connection closed")]
    Closed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The node answered the command with an error envelope.
    #[error("{command} failed: {error} ({code:?}): {message}")]
    Command {
        command: String,
        /// Short error token, e.g. `actNotFound`.
        error: String,
        code: Option<i64>,
        message: String,
    },

    /// Command parameters could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// A reply could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// The reply decoded but violates the protocol (e.g. a missing acknowledgement).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// True for errors that end the whole session rather than one command.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Closed)
    }

    pub(crate) fn decode(e: impl std::fmt::Display) -> Self {
        Self::Decode(e.to_string())
    }

    pub(crate) fn encode(e: impl std::fmt::Display) -> Self {
        Self::Encode(e.to_string())
    }
}
