//! Transport trait and message classes.
//!
//! The session only needs a message-oriented duplex connection. Each backend
//! lives in its own module under `transport/` and implements [`Transport`].
//! Deadlines are applied by the pumps around each call, not by the backend.

use std::future::Future;

use crate::TransportError;

mod mem;
mod websocket;

pub use mem::MemTransport;
pub use websocket::WebSocketTransport;

/// One transport message.
///
/// `Text` carries application traffic; the rest are control-class frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Trait for transport implementations.
///
/// Handles are cheap to clone; the read pump and write pump each hold one.
/// Only the read pump calls `recv_message` and only the write pump calls
/// `send_message`.
pub trait Transport: Send + Sync + Clone + 'static {
    /// Send one message.
    fn send_message(
        &self,
        message: Message,
    ) -> impl Future<Output = Result<(), TransportError>> + Send + '_;

    /// Receive the next message.
    fn recv_message(&self) -> impl Future<Output = Result<Message, TransportError>> + Send + '_;

    /// Close the connection.
    ///
    /// After closing, pending and future `send_message`/`recv_message` calls
    /// return [`TransportError::Closed`].
    fn close(&self);

    /// Check if this transport is closed.
    fn is_closed(&self) -> bool;

    /// Human-readable peer address, for logs.
    fn peer(&self) -> String;
}
