//! Dispatch loop: the single owner of the correlation table.
//!
//! Multiplexes three sources: caller submissions, inbound payloads from the
//! read pump, and the shutdown signal. Any of them ending starts teardown.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::command::{Command, Envelope};
use crate::correlation::CorrelationTable;
use crate::notification::NotificationRegistry;
use crate::session::ConnectionState;
use crate::RemoteError;

/// Why the dispatch loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    /// `close()` was called.
    Shutdown,
    /// Every session handle was dropped.
    Abandoned,
    /// The read pump stopped: peer close, read error or read deadline.
    ReadClosed,
    /// The write pump stopped accepting payloads.
    WriteClosed,
}

pub(crate) struct DispatchLoop<N> {
    table: CorrelationTable,
    registry: Arc<NotificationRegistry<N>>,
    delivery: mpsc::Sender<N>,
    state: Arc<ConnectionState>,
    peer: String,
    /// Notifications lost to a full delivery queue.
    dropped: u64,
}

/// Queues the dispatch loop runs over.
pub(crate) struct Queues {
    pub submissions: mpsc::Receiver<Command>,
    pub inbound: mpsc::Receiver<Vec<u8>>,
    pub outbound: mpsc::Sender<String>,
}

impl<N: Send + 'static> DispatchLoop<N> {
    pub(crate) fn new(
        registry: Arc<NotificationRegistry<N>>,
        delivery: mpsc::Sender<N>,
        state: Arc<ConnectionState>,
        peer: String,
    ) -> Self {
        Self {
            table: CorrelationTable::new(),
            registry,
            delivery,
            state,
            peer,
            dropped: 0,
        }
    }

    /// Run until a source ends, then tear the session down.
    ///
    /// Returns once the read pump has stopped producing; by then every
    /// command ever submitted has been completed or failed.
    pub(crate) async fn run(mut self, queues: Queues, shutdown: CancellationToken) -> StopReason {
        let Queues {
            mut submissions,
            mut inbound,
            outbound,
        } = queues;

        let reason = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break StopReason::Shutdown,
                message = inbound.recv() => match message {
                    Some(bytes) => self.route(&bytes),
                    None => break StopReason::ReadClosed,
                },
                command = submissions.recv() => match command {
                    Some(command) => {
                        if !self.forward(command, &outbound, &shutdown).await {
                            break StopReason::WriteClosed;
                        }
                    }
                    None => break StopReason::Abandoned,
                },
            }
        };

        self.teardown(reason, submissions, inbound, outbound).await;
        reason
    }

    /// Assign an id, track the command, and hand its payload to the write pump.
    ///
    /// Returns false when the write pump is gone or shutdown was requested
    /// while waiting for it.
    async fn forward(
        &mut self,
        mut command: Command,
        outbound: &mpsc::Sender<String>,
        shutdown: &CancellationToken,
    ) -> bool {
        command.assign_id(self.table.next_id());
        let text = match command.encode() {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(id = command.id(), command = command.verb(), %err, "failed to encode command");
                command.fail(err);
                return true;
            }
        };

        let id = command.id();
        tracing::debug!(
            remote = %self.peer,
            id,
            command = command.verb(),
            pending = self.table.len() + 1,
            "sending command"
        );
        self.table.insert(command);

        tokio::select! {
            sent = outbound.send(text) => sent.is_ok(),
            _ = shutdown.cancelled() => false,
        }
    }

    /// Route one inbound payload: push notification, reply, or noise.
    fn route(&mut self, bytes: &[u8]) {
        let envelope: Envelope = match serde_json::from_slice(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(remote = %self.peer, %err, "failed to decode message envelope");
                return;
            }
        };

        if let Some(kind) = envelope.kind.as_deref() {
            if let Some(decoded) = self.registry.decode(kind, bytes) {
                match decoded {
                    Ok(notification) => self.deliver(kind, notification),
                    Err(err) => {
                        tracing::error!(remote = %self.peer, kind, %err, "failed to decode notification");
                    }
                }
                return;
            }
        }

        match envelope.id {
            Some(id) => {
                if !self.table.complete(id, bytes) {
                    tracing::warn!(remote = %self.peer, id, "unexpected message: no pending command");
                }
            }
            None => {
                tracing::warn!(remote = %self.peer, kind = ?envelope.kind, "unexpected message: no id");
            }
        }
    }

    fn deliver(&mut self, kind: &str, notification: N) {
        match self.delivery.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                tracing::warn!(
                    remote = %self.peer,
                    kind,
                    dropped = self.dropped,
                    "delivery queue full; dropping notification"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!(remote = %self.peer, kind, "no notification consumer");
            }
        }
    }

    async fn teardown(
        mut self,
        reason: StopReason,
        mut submissions: mpsc::Receiver<Command>,
        mut inbound: mpsc::Receiver<Vec<u8>>,
        outbound: mpsc::Sender<String>,
    ) {
        self.state.set_connected(false);

        // Refuse further submissions, then fail everything we still hold.
        submissions.close();
        let mut failed = self.table.fail_all(&RemoteError::Closed);
        while let Ok(command) = submissions.try_recv() {
            command.fail(RemoteError::Closed);
            failed += 1;
        }

        match reason {
            StopReason::ReadClosed | StopReason::WriteClosed => {
                tracing::error!(remote = %self.peer, ?reason, failed, dropped = self.dropped, "connection lost");
            }
            StopReason::Shutdown | StopReason::Abandoned => {
                tracing::info!(remote = %self.peer, ?reason, failed, dropped = self.dropped, "closing session");
            }
        }

        // The write pump sends a close frame and exits once outbound closes.
        drop(outbound);

        let mut discarded = 0usize;
        while inbound.recv().await.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            tracing::debug!(remote = %self.peer, discarded, "discarded messages after teardown");
        }
        debug_assert!(self.table.is_empty());
    }
}
