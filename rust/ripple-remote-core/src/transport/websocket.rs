use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_util::sync::CancellationToken;

use super::{Message, Transport};
use crate::TransportError;

type BoxSink = Pin<Box<dyn Sink<WsMessage, Error = tungstenite::Error> + Send>>;
type BoxStream = Pin<Box<dyn Stream<Item = Result<WsMessage, tungstenite::Error>> + Send>>;

struct WebSocketInner {
    sink: AsyncMutex<BoxSink>,
    stream: AsyncMutex<BoxStream>,
    closed: CancellationToken,
    peer: String,
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Clone)]
pub struct WebSocketTransport {
    inner: Arc<WebSocketInner>,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("peer", &self.inner.peer)
            .field("closed", &self.inner.closed.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Dial `endpoint` (a `ws://` or `wss://` URL) and complete the WebSocket handshake.
    pub async fn connect(endpoint: &str, dial_timeout: Duration) -> Result<Self, TransportError> {
        tracing::info!(remote = endpoint, "dialing remote");
        let (ws, _response) =
            tokio::time::timeout(dial_timeout, tokio_tungstenite::connect_async(endpoint))
                .await
                .map_err(|_| TransportError::Dial(format!("timed out after {dial_timeout:?}")))?
                .map_err(|e| TransportError::Dial(e.to_string()))?;
        Ok(Self::new(ws, endpoint))
    }

    /// Wrap an already-established WebSocket stream.
    pub fn new<S>(ws: tokio_tungstenite::WebSocketStream<S>, peer: impl Into<String>) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        Self {
            inner: Arc::new(WebSocketInner {
                sink: AsyncMutex::new(Box::pin(sink)),
                stream: AsyncMutex::new(Box::pin(stream)),
                closed: CancellationToken::new(),
                peer: peer.into(),
            }),
        }
    }

    fn fail<T>(&self, e: tungstenite::Error) -> Result<T, TransportError> {
        self.inner.closed.cancel();
        Err(e.into())
    }
}

fn to_ws(message: Message) -> WsMessage {
    match message {
        Message::Text(text) => WsMessage::Text(text.into()),
        Message::Binary(data) => WsMessage::Binary(data.into()),
        Message::Ping(data) => WsMessage::Ping(data.into()),
        Message::Pong(data) => WsMessage::Pong(data.into()),
        Message::Close => WsMessage::Close(None),
    }
}

impl Transport for WebSocketTransport {
    async fn send_message(&self, message: Message) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut sink = self.inner.sink.lock().await;
        let sent = tokio::select! {
            _ = self.inner.closed.cancelled() => return Err(TransportError::Closed),
            sent = sink.send(to_ws(message)) => sent,
        };
        match sent {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    async fn recv_message(&self) -> Result<Message, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut stream = self.inner.stream.lock().await;
        loop {
            let item = tokio::select! {
                _ = self.inner.closed.cancelled() => return Err(TransportError::Closed),
                item = stream.next() => item,
            };
            return match item {
                None => {
                    self.inner.closed.cancel();
                    Err(TransportError::Closed)
                }
                Some(Err(e)) => self.fail(e),
                Some(Ok(WsMessage::Text(text))) => Ok(Message::Text(text.as_str().to_owned())),
                Some(Ok(WsMessage::Binary(data))) => Ok(Message::Binary(data.to_vec())),
                Some(Ok(WsMessage::Ping(data))) => Ok(Message::Ping(data.to_vec())),
                Some(Ok(WsMessage::Pong(data))) => Ok(Message::Pong(data.to_vec())),
                Some(Ok(WsMessage::Close(_))) => Ok(Message::Close),
                // Raw frames only surface when reading with a custom config.
                Some(Ok(WsMessage::Frame(_))) => continue,
            };
        }
    }

    fn close(&self) {
        self.inner.closed.cancel();
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    fn peer(&self) -> String {
        self.inner.peer.clone()
    }
}
