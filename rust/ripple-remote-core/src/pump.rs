//! Read and write pumps: the only tasks touching the transport.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::transport::{Message, Transport};
use crate::{RemoteConfig, TransportError};

/// Read from the transport and forward text payloads to the dispatch loop.
///
/// Every received message, pongs included, re-arms the read deadline.
/// Returns on any receive error, deadline, or close from the peer; dropping
/// `inbound` is what tells the dispatch loop the connection is gone.
pub(crate) async fn read_pump<T: Transport>(
    transport: T,
    inbound: mpsc::Sender<Vec<u8>>,
    config: RemoteConfig,
) -> TransportError {
    let peer = transport.peer();
    loop {
        let message = match tokio::time::timeout(config.pong_wait, transport.recv_message()).await
        {
            Ok(Ok(message)) => message,
            Ok(Err(err)) => {
                tracing::error!(remote = %peer, %err, "ws read message error");
                return err;
            }
            Err(_elapsed) => {
                tracing::error!(remote = %peer, pong_wait = ?config.pong_wait, "read deadline exceeded");
                return TransportError::Timeout {
                    op: "read",
                    after: config.pong_wait,
                };
            }
        };

        match message {
            Message::Text(text) => {
                if config.debug {
                    tracing::info!(remote = %peer, message = %dump(&text), "ws read message");
                }
                if inbound.send(text.into_bytes()).await.is_err() {
                    tracing::debug!(remote = %peer, "dispatch loop gone; stopping read pump");
                    return TransportError::Closed;
                }
            }
            Message::Pong(_) => tracing::trace!(remote = %peer, "pong"),
            // Answering pings is the WebSocket layer's job.
            Message::Ping(_) => tracing::trace!(remote = %peer, "ping"),
            Message::Binary(data) => {
                tracing::debug!(remote = %peer, len = data.len(), "ignoring binary message");
            }
            Message::Close => {
                tracing::warn!(remote = %peer, "connection closed by server");
                return TransportError::Closed;
            }
        }
    }
}

/// Write outbound payloads and periodic pings to the transport.
///
/// Returns after sending a close frame once `outbound` is closed, or on the
/// first write error.
pub(crate) async fn write_pump<T: Transport>(
    transport: T,
    mut outbound: mpsc::Receiver<String>,
    config: RemoteConfig,
) -> Result<(), TransportError> {
    let peer = transport.peer();
    let mut ticker = tokio::time::interval_at(Instant::now() + config.ping_period, config.ping_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(text) = message else {
                    tracing::debug!(remote = %peer, "outbound closed; sending close frame");
                    return write(&transport, Message::Close, config.write_wait).await;
                };
                if config.debug {
                    tracing::info!(remote = %peer, message = %dump(&text), "ws write message");
                }
                if let Err(err) = write(&transport, Message::Text(text), config.write_wait).await {
                    tracing::error!(remote = %peer, %err, "ws write message error");
                    return Err(err);
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = write(&transport, Message::Ping(Vec::new()), config.write_wait).await {
                    tracing::error!(remote = %peer, %err, "ws write ping message error");
                    return Err(err);
                }
                tracing::trace!(remote = %peer, "ping");
            }
        }
    }
}

async fn write<T: Transport>(
    transport: &T,
    message: Message,
    write_wait: Duration,
) -> Result<(), TransportError> {
    tokio::time::timeout(write_wait, transport.send_message(message))
        .await
        .map_err(|_| TransportError::Timeout {
            op: "write",
            after: write_wait,
        })?
}

/// Pretty-print a JSON payload for debug logging; non-JSON is returned as is.
fn dump(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| text.to_string())
}
