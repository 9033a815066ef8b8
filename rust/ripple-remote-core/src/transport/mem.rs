use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Message, Transport};
use crate::TransportError;

const CHANNEL_CAPACITY: usize = 64;

/// In-process duplex transport. Closing either end closes the connection.
///
/// Unlike a real WebSocket stack it never answers pings by itself; the far
/// end decides whether to send a pong.
#[derive(Clone, Debug)]
pub struct MemTransport {
    inner: Arc<MemInner>,
}

#[derive(Debug)]
struct MemInner {
    tx: mpsc::Sender<Message>,
    rx: AsyncMutex<mpsc::Receiver<Message>>,
    closed: CancellationToken,
    name: &'static str,
}

impl MemTransport {
    /// Returns `(client, server)` ends of one connection.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::channel(CHANNEL_CAPACITY);
        let (tx_b, rx_b) = mpsc::channel(CHANNEL_CAPACITY);
        let closed = CancellationToken::new();

        let client = MemInner {
            tx: tx_b,
            rx: AsyncMutex::new(rx_a),
            closed: closed.clone(),
            name: "mem-server",
        };
        let server = MemInner {
            tx: tx_a,
            rx: AsyncMutex::new(rx_b),
            closed,
            name: "mem-client",
        };
        (
            Self {
                inner: Arc::new(client),
            },
            Self {
                inner: Arc::new(server),
            },
        )
    }
}

impl Transport for MemTransport {
    async fn send_message(&self, message: Message) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        tokio::select! {
            _ = self.inner.closed.cancelled() => Err(TransportError::Closed),
            sent = self.inner.tx.send(message) => sent.map_err(|_| TransportError::Closed),
        }
    }

    async fn recv_message(&self) -> Result<Message, TransportError> {
        // Messages already in flight stay readable after close, like bytes in a socket buffer.
        let mut rx = self.inner.rx.lock().await;
        tokio::select! {
            biased;
            message = rx.recv() => message.ok_or(TransportError::Closed),
            _ = self.inner.closed.cancelled() => Err(TransportError::Closed),
        }
    }

    fn close(&self) {
        self.inner.closed.cancel();
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    fn peer(&self) -> String {
        self.inner.name.to_string()
    }
}
