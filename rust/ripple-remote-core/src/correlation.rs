//! Correlation table: pending command id -> command.
//!
//! Owned by the dispatch loop alone, so no locking.

use std::collections::HashMap;

use crate::command::{Command, CommandId};
use crate::RemoteError;

#[derive(Debug)]
pub(crate) struct CorrelationTable {
    pending: HashMap<CommandId, Command>,
    next_id: CommandId,
}

impl CorrelationTable {
    pub(crate) fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate the next command id.
    ///
    /// Ids increase monotonically, so no two pending commands share one.
    pub(crate) fn next_id(&mut self) -> CommandId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Start tracking a command under the id it was assigned.
    pub(crate) fn insert(&mut self, command: Command) {
        debug_assert!(!self.pending.contains_key(&command.id()));
        self.pending.insert(command.id(), command);
    }

    /// Assign a fresh id to `command` and start tracking it.
    #[cfg(test)]
    fn register(&mut self, mut command: Command) -> CommandId {
        let id = self.next_id();
        command.assign_id(id);
        self.insert(command);
        id
    }

    /// Complete the command registered under `id` with `reply`.
    ///
    /// Returns false (and does nothing) when no such command is pending.
    pub(crate) fn complete(&mut self, id: CommandId, reply: &[u8]) -> bool {
        match self.pending.remove(&id) {
            Some(command) => {
                command.complete(reply);
                true
            }
            None => false,
        }
    }

    /// Fail every pending command with `error`, leaving the table empty.
    pub(crate) fn fail_all(&mut self, error: &RemoteError) -> usize {
        let failed = self.pending.len();
        for (_, command) in self.pending.drain() {
            command.fail(error.clone());
        }
        failed
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
