//! Commands: one outstanding request/response unit.
//!
//! A [`Command`] is built on the caller's side from any [`Request`], handed to
//! the dispatch loop, and completed exactly once: either with the decoded
//! reply or with an error. The caller holds the matching [`Pending`] future.
//!
//! Completion consumes the command, so a second completion is impossible by
//! construction.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::RemoteError;

/// Identifier correlating a reply with its command. Unique per session.
pub type CommandId = u64;

/// A typed request verb.
///
/// The request body serializes to the parameters of the command object; the
/// node's `result` object deserializes into `Response`.
pub trait Request: Serialize {
    /// Verb sent in the `command` field.
    const COMMAND: &'static str;

    type Response: DeserializeOwned + Send + 'static;
}

trait Completion: Send {
    fn complete(self: Box<Self>, id: CommandId, reply: &[u8]);
    fn fail(self: Box<Self>, error: RemoteError);
}

struct TypedCompletion<R> {
    verb: &'static str,
    tx: oneshot::Sender<Result<R, RemoteError>>,
}

impl<R: DeserializeOwned + Send + 'static> Completion for TypedCompletion<R> {
    fn complete(self: Box<Self>, id: CommandId, reply: &[u8]) {
        let result = decode_reply::<R>(self.verb, reply);
        if let Err(RemoteError::Decode(err)) = &result {
            tracing::error!(id, command = self.verb, %err, "failed to decode reply");
        }
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.tx.send(result);
    }

    fn fail(self: Box<Self>, error: RemoteError) {
        let _ = self.tx.send(Err(error));
    }
}

/// One request on its way to the node, plus its completion signal.
pub struct Command {
    id: CommandId,
    verb: &'static str,
    params: Map<String, Value>,
    completion: Box<dyn Completion>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("verb", &self.verb)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct WireCommand<'a> {
    id: CommandId,
    command: &'a str,
    #[serde(flatten)]
    params: &'a Map<String, Value>,
}

impl Command {
    /// Build a command for `request`. The id is assigned by the dispatch loop.
    pub fn new<R: Request>(request: &R) -> Result<(Self, Pending<R::Response>), RemoteError> {
        let params = match serde_json::to_value(request).map_err(RemoteError::encode)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(RemoteError::Encode(format!(
                    "{} parameters must be a JSON object, got {other}",
                    R::COMMAND
                )));
            }
        };
        let (tx, rx) = oneshot::channel();
        let command = Self {
            id: 0,
            verb: R::COMMAND,
            params,
            completion: Box::new(TypedCompletion {
                verb: R::COMMAND,
                tx,
            }),
        };
        Ok((command, Pending { rx }))
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn verb(&self) -> &'static str {
        self.verb
    }

    pub(crate) fn assign_id(&mut self, id: CommandId) {
        self.id = id;
    }

    /// Serialize as `{"id": .., "command": .., ...params}`.
    pub(crate) fn encode(&self) -> Result<String, RemoteError> {
        serde_json::to_string(&WireCommand {
            id: self.id,
            command: self.verb,
            params: &self.params,
        })
        .map_err(RemoteError::encode)
    }

    /// Decode `reply` into the result slot and fire the completion signal.
    pub(crate) fn complete(self, reply: &[u8]) {
        self.completion.complete(self.id, reply);
    }

    pub(crate) fn fail(self, error: RemoteError) {
        self.completion.fail(error);
    }
}

/// Future resolving to a command's result.
///
/// Resolves to [`RemoteError::Closed`] if the session drops the command
/// without completing it.
#[must_use = "a pending command does nothing unless awaited"]
pub struct Pending<R> {
    rx: oneshot::Receiver<Result<R, RemoteError>>,
}

impl<R> Future for Pending<R> {
    type Output = Result<R, RemoteError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RemoteError::Closed)))
    }
}

/// Generic envelope: just enough to classify an inbound message.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub id: Option<CommandId>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
struct ReplyEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    result: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct ResultError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
}

fn command_error(
    verb: &str,
    error: Option<String>,
    code: Option<i64>,
    message: Option<String>,
) -> RemoteError {
    RemoteError::Command {
        command: verb.to_string(),
        error: error.unwrap_or_else(|| "unknown".to_string()),
        code,
        message: message.unwrap_or_default(),
    }
}

/// Decode a full reply: error envelopes become [`RemoteError::Command`],
/// success envelopes have their `result` decoded into `R`.
fn decode_reply<R: DeserializeOwned>(verb: &str, reply: &[u8]) -> Result<R, RemoteError> {
    let envelope: ReplyEnvelope = serde_json::from_slice(reply).map_err(RemoteError::decode)?;
    if envelope.error.is_some() || envelope.status.as_deref() == Some("error") {
        return Err(command_error(
            verb,
            envelope.error,
            envelope.error_code,
            envelope.error_message,
        ));
    }
    let raw = envelope
        .result
        .ok_or_else(|| RemoteError::Decode(format!("{verb} reply has no result")))?;

    // Some node versions report errors inside `result`.
    if let Ok(ResultError {
        error: Some(error),
        error_code,
        error_message,
    }) = serde_json::from_str::<ResultError>(raw.get())
    {
        return Err(command_error(verb, Some(error), error_code, error_message));
    }

    serde_json::from_str(raw.get()).map_err(RemoteError::decode)
}
