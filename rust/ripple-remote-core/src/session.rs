//! Session: one connection to a ledger node.
//!
//! # Architecture
//!
//! ```text
//!   callers ──submit──► [submission queue] ──┐
//!                                            ▼
//!                                    ┌───────────────┐  outbound  ┌────────────┐
//!                                    │ dispatch loop │──────────►│ write pump │──► transport
//!                                    │ (owns table)  │           │ (+ pings)  │
//!                                    └───────────────┘           └────────────┘
//!                                      ▲          │
//!                              inbound │          │ push notifications
//!                                      │          ▼
//!   transport ──► ┌───────────┐ ───────┘   [delivery queue] ──► incoming()
//!                 │ read pump │
//!                 └───────────┘
//! ```
//!
//! Only the pumps touch the transport, and only the dispatch loop touches
//! the correlation table. Any of the three stopping tears the session down:
//! pending commands fail with [`RemoteError::Closed`], a close frame is sent,
//! and the transport is closed.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::command::{Command, Pending, Request};
use crate::dispatch::{DispatchLoop, Queues};
use crate::notification::NotificationRegistry;
use crate::pump::{read_pump, write_pump};
use crate::transport::{Transport, WebSocketTransport};
use crate::{RemoteConfig, RemoteError};

/// Connected flag shared between the session handles and the dispatch loop.
#[derive(Debug)]
pub(crate) struct ConnectionState {
    connected: RwLock<bool>,
}

impl ConnectionState {
    pub(crate) fn new(connected: bool) -> Self {
        Self {
            connected: RwLock::new(connected),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        *self.connected.read()
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        *self.connected.write() = connected;
    }
}

/// Handle to a running session. Cheap to clone; all clones share one connection.
///
/// Dropping every handle without calling [`close`](Self::close) still tears
/// the session down, just without waiting for it.
pub struct Session<T: Transport, N = serde_json::Value> {
    inner: Arc<SessionInner<T, N>>,
}

impl<T: Transport, N> Clone for Session<T, N> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct SessionInner<T, N> {
    transport: T,
    config: RemoteConfig,
    state: Arc<ConnectionState>,
    submissions: mpsc::Sender<Command>,
    incoming: Mutex<Option<mpsc::Receiver<N>>>,
    shutdown: CancellationToken,
    runner: AsyncMutex<Option<JoinHandle<()>>>,
}

impl<N: Send + 'static> Session<WebSocketTransport, N> {
    /// Dial `endpoint` (`ws://` or `wss://`) and start the session.
    pub async fn connect(
        endpoint: &str,
        registry: NotificationRegistry<N>,
        config: RemoteConfig,
    ) -> Result<Self, RemoteError> {
        config.validate()?;
        let transport = WebSocketTransport::connect(endpoint, config.dial_timeout).await?;
        Self::start(transport, registry, config)
    }
}

impl<T: Transport, N: Send + 'static> Session<T, N> {
    /// Start a session over an established transport.
    ///
    /// Spawns the read pump, the write pump and the dispatch loop, so it must
    /// be called from within a tokio runtime. The session is connected when
    /// this returns.
    pub fn start(
        transport: T,
        registry: NotificationRegistry<N>,
        config: RemoteConfig,
    ) -> Result<Self, RemoteError> {
        config.validate()?;

        let (submissions_tx, submissions) = mpsc::channel(config.submission_depth);
        let (delivery_tx, delivery) = mpsc::channel(config.delivery_depth);
        let (inbound_tx, inbound) = mpsc::channel(1);
        let (outbound, outbound_rx) = mpsc::channel(1);

        let state = Arc::new(ConnectionState::new(true));
        let shutdown = CancellationToken::new();
        let peer = transport.peer();
        tracing::info!(remote = %peer, "session started");

        let reader = tokio::spawn(read_pump(transport.clone(), inbound_tx, config.clone()));
        let writer = tokio::spawn({
            let transport = transport.clone();
            let config = config.clone();
            async move {
                let result = write_pump(transport.clone(), outbound_rx, config).await;
                // Unblocks the read pump, which in turn ends the dispatch loop.
                transport.close();
                result
            }
        });

        let dispatch = DispatchLoop::new(Arc::new(registry), delivery_tx, state.clone(), peer.clone());
        let queues = Queues {
            submissions,
            inbound,
            outbound,
        };
        let runner = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let reason = dispatch.run(queues, shutdown).await;
                let (read, write) = tokio::join!(reader, writer);
                if let Err(err) = read {
                    tracing::error!(remote = %peer, %err, "read pump panicked");
                }
                match write {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => tracing::debug!(remote = %peer, %err, "write pump stopped"),
                    Err(err) => tracing::error!(remote = %peer, %err, "write pump panicked"),
                }
                tracing::info!(remote = %peer, ?reason, "session finished");
            }
        });

        Ok(Self {
            inner: Arc::new(SessionInner {
                transport,
                config,
                state,
                submissions: submissions_tx,
                incoming: Mutex::new(Some(delivery)),
                shutdown,
                runner: AsyncMutex::new(Some(runner)),
            }),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.inner.config
    }

    /// Peer address of the underlying transport.
    pub fn peer(&self) -> String {
        self.inner.transport.peer()
    }

    /// Take the push-notification stream.
    ///
    /// There is a single consumer: the first call gets the receiver, later
    /// calls get `None`. The stream ends when the session tears down.
    pub fn incoming(&self) -> Option<mpsc::Receiver<N>> {
        self.inner.incoming.lock().take()
    }

    /// Queue `request` and return a future for its reply.
    ///
    /// Fails fast with [`RemoteError::NotConnected`] once the session is
    /// down. Waits for room when the submission queue is full; the wait ends
    /// with [`RemoteError::Closed`] if the session tears down meanwhile.
    pub async fn submit<R: Request>(&self, request: &R) -> Result<Pending<R::Response>, RemoteError> {
        if !self.is_connected() {
            return Err(RemoteError::NotConnected);
        }
        let (command, pending) = Command::new(request)?;
        self.inner
            .submissions
            .send(command)
            .await
            .map_err(|_| RemoteError::Closed)?;
        Ok(pending)
    }

    /// Send `request` and wait for its reply.
    pub async fn request<R: Request>(&self, request: &R) -> Result<R::Response, RemoteError> {
        self.submit(request).await?.await
    }

    /// Tear the session down and wait for all of its tasks to exit.
    ///
    /// Safe to call more than once and from several handles; every call
    /// returns only after teardown has finished.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let mut runner = self.inner.runner.lock().await;
        if let Some(handle) = runner.take() {
            if let Err(err) = handle.await {
                tracing::error!(%err, "session task panicked");
            }
        }
    }
}

impl<T: Transport, N> std::fmt::Debug for Session<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.inner.transport.peer())
            .field("connected", &self.inner.state.is_connected())
            .finish_non_exhaustive()
    }
}
