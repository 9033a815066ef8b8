//! Scripted ledger node on the far end of a `MemTransport` pair.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::Mutex;
use ripple_remote::data::Hash256;
use ripple_remote::{MemTransport, Remote, RemoteConfig, Transport};
use ripple_remote_core::Message;
use serde_json::{Value, json};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn success(request: &Value, result: Value) -> Value {
    json!({
        "id": request["id"],
        "type": "response",
        "status": "success",
        "result": result,
    })
}

pub fn failure(request: &Value, error: &str, code: i64) -> Value {
    json!({
        "id": request["id"],
        "type": "response",
        "status": "error",
        "error": error,
        "error_code": code,
        "error_message": format!("{error} (mock)"),
        "request": request,
    })
}

pub struct MockNode {
    server: MemTransport,
    requests: Arc<Mutex<Vec<Value>>>,
    task: tokio::task::JoinHandle<()>,
}

impl MockNode {
    /// Serve commands with `handler`, which returns the messages to send back.
    /// Pings are answered with pongs.
    pub fn spawn<F>(server: MemTransport, mut handler: F) -> Self
    where
        F: FnMut(&Value) -> Vec<Value> + Send + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();
        let transport = server.clone();
        let task = tokio::spawn(async move {
            while let Ok(message) = transport.recv_message().await {
                match message {
                    Message::Text(text) => {
                        let request: Value = serde_json::from_str(&text).expect("command is JSON");
                        log.lock().push(request.clone());
                        for reply in handler(&request) {
                            if transport.send_message(Message::Text(reply.to_string())).await.is_err() {
                                return;
                            }
                        }
                    }
                    Message::Ping(data) => {
                        if transport.send_message(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Message::Close => return,
                    _ => {}
                }
            }
        });
        Self {
            server,
            requests,
            task,
        }
    }

    /// Every command received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }

    /// Commands received for `verb`.
    pub fn requests_for(&self, verb: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|request| request["command"] == verb)
            .collect()
    }

    /// Send an unsolicited message.
    pub async fn push(&self, message: Value) {
        self.server
            .send_message(Message::Text(message.to_string()))
            .await
            .expect("push failed");
    }

    /// Drop the connection from the node's side.
    pub async fn hang_up(self) {
        let _ = self.server.send_message(Message::Close).await;
        self.task.abort();
    }
}

/// Start a `Remote` talking to a mock node.
pub fn connect<F>(handler: F) -> (Remote<MemTransport>, MockNode)
where
    F: FnMut(&Value) -> Vec<Value> + Send + 'static,
{
    init_tracing();
    let (client, server) = MemTransport::pair();
    let node = MockNode::spawn(server, handler);
    let remote = Remote::with_transport(client, RemoteConfig::default()).expect("remote starts");
    (remote, node)
}

/// Ledger state served through binary `ledger_data`, resuming strictly after
/// the request marker like a real node.
pub struct LedgerState {
    entries: BTreeMap<Hash256, String>,
    page_size: usize,
    ledger_index: u32,
}

impl LedgerState {
    pub fn new(keys: impl IntoIterator<Item = Hash256>, page_size: usize, ledger_index: u32) -> Self {
        // LedgerEntryType = RippleState, Flags = 0.
        let entries = keys
            .into_iter()
            .map(|key| (key, "1100722200000000".to_string()))
            .collect();
        Self {
            entries,
            page_size,
            ledger_index,
        }
    }

    pub fn page(&self, request: &Value) -> Value {
        let lower = match request.get("marker").and_then(Value::as_str) {
            Some(marker) => Bound::Excluded(marker.parse::<Hash256>().expect("marker is a key")),
            None => Bound::Unbounded,
        };
        let mut keys = self.entries.range((lower, Bound::Unbounded));
        let state: Vec<Value> = keys
            .by_ref()
            .take(self.page_size)
            .map(|(key, data)| json!({"data": data, "index": key.to_string()}))
            .collect();

        let mut result = json!({
            "ledger_index": self.ledger_index,
            "ledger_hash": Hash256::MAX.to_string(),
            "state": state,
        });
        if keys.next().is_some() {
            let last = state
                .last()
                .map(|entry| entry["index"].clone())
                .expect("non-empty page");
            result["marker"] = last;
        }
        result
    }
}
