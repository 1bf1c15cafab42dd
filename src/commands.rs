//! # Commands
//!
//! User-facing history entries and the stacks that hold them. A [`Command`]
//! pairs a label with a finalized [`InverseLog`]; the forward action, when
//! present, is an ordinary closure over the layer's mutation API - it never
//! constructs inverses itself, the engine captures them as a side effect of
//! running it inside an [`EditScope`].
//!
//! [`CommandManager`] is the only part of the engine application code calls
//! directly: stage commands, execute them, undo, redo. Operations on empty
//! stacks are normal no-ops, never errors.

use std::collections::VecDeque;

use crate::layer::{Layer, LayerError};
use crate::undo::{CompletedBatch, EditScope, InverseLog, UndoRouter};

/// Deferred forward action of a command. Runs against whatever layer the
/// manager is driven with; holds no layer references of its own.
pub type CommandAction = Box<dyn FnMut(&mut Layer) -> Result<(), LayerError>>;

/// One history entry: a label, an optional forward action, and the log that
/// currently reverses it.
///
/// The log is self-transforming: replaying it (inside a scope) captures the
/// opposite log, which replaces it. An undo log becomes a redo log and back
/// again, so undo and redo are the same operation.
pub struct Command {
    label: String,
    action: Option<CommandAction>,
    inverse: InverseLog,
}

impl Command {
    /// A command whose forward action has not run yet. Stage it with
    /// [`CommandManager::add_command`] and run it with
    /// [`CommandManager::execute_commands`].
    pub fn new(
        label: impl Into<String>,
        action: impl FnMut(&mut Layer) -> Result<(), LayerError> + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            action: Some(Box::new(action)),
            inverse: InverseLog::default(),
        }
    }
    /// Wrap an already-performed batch of live edits as a history entry.
    #[must_use]
    pub fn from_batch(label: impl Into<String>, log: InverseLog) -> Self {
        Self {
            label: label.into(),
            action: None,
            inverse: log,
        }
    }
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
    #[must_use]
    pub fn inverse(&self) -> &InverseLog {
        &self.inverse
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("label", &self.label)
            .field("ops", &self.inverse.len())
            .finish()
    }
}

/// Owns the todo/undo/redo stacks and drives command execution and replay.
///
/// The manager subscribes to the router's batch channel at construction and
/// is its single consumer: batches from command execution (and from raw
/// scoped edits made outside any command) all land here.
pub struct CommandManager {
    router: UndoRouter,
    batches: std::sync::mpsc::Receiver<CompletedBatch>,
    /// Staged but not yet executed, oldest first.
    todo: VecDeque<Command>,
    /// Executed, reversible. Top of stack is the most recent edit.
    undo: Vec<Command>,
    /// Undone, re-applicable. Invalidated by any new edit.
    redo: Vec<Command>,
}

impl CommandManager {
    #[must_use]
    pub fn new(router: UndoRouter) -> Self {
        let batches = router.subscribe();
        Self {
            router,
            batches,
            todo: VecDeque::new(),
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }
    #[must_use]
    pub fn router(&self) -> &UndoRouter {
        &self.router
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
    /// Labels of the undo stack, oldest first.
    pub fn undo_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.undo.iter().map(Command::label)
    }

    /// Stage a command for deferred execution.
    pub fn add_command(&mut self, command: Command) {
        self.todo.push_back(command);
    }

    /// Adopt every batch of raw scoped edits waiting on the channel as a
    /// history entry labeled `label`. New edits invalidate redo history.
    /// Returns how many entries were adopted.
    pub fn adopt_pending(&mut self, label: &str) -> usize {
        let mut adopted = 0;
        while let Ok(batch) = self.batches.try_recv() {
            self.redo.clear();
            self.undo.push(Command::from_batch(label, batch.log));
            adopted += 1;
        }
        adopted
    }

    /// Pop the oldest staged command, run its forward action inside a fresh
    /// scope, adopt the captured batch as its inverse, and push it onto the
    /// undo stack. No-op if nothing is staged.
    pub fn execute_commands(&mut self, layer: &mut Layer) {
        self.adopt_pending("edit");
        let Some(mut command) = self.todo.pop_front() else {
            return;
        };
        log::trace!("executing command '{}'", command.label);
        self.redo.clear();
        {
            let _scope = EditScope::new(&self.router);
            if let Some(action) = &mut command.action {
                if let Err(error) = action(layer) {
                    // Partial edits are still captured below, so whatever did
                    // happen stays reversible.
                    log::error!("command '{}' failed: {error}", command.label);
                }
            }
        }
        command.inverse = self.collect_batch();
        self.undo.push(command);
    }

    /// Reverse the most recent command. No-op on an empty undo stack.
    pub fn undo(&mut self, layer: &mut Layer) {
        self.adopt_pending("edit");
        let Some(command) = self.undo.pop() else {
            return;
        };
        log::trace!("undoing '{}'", command.label);
        let command = self.invert(command, layer);
        self.redo.push(command);
    }

    /// Re-apply the most recently undone command. No-op on an empty redo
    /// stack.
    pub fn redo(&mut self, layer: &mut Layer) {
        // A raw edit arriving here clears redo, making this a no-op - which
        // is exactly the invalidation the history model wants.
        self.adopt_pending("edit");
        let Some(command) = self.redo.pop() else {
            return;
        };
        log::trace!("redoing '{}'", command.label);
        let command = self.invert(command, layer);
        self.undo.push(command);
    }

    /// Drop all staged and recorded history.
    pub fn clear(&mut self) {
        self.todo.clear();
        self.undo.clear();
        self.redo.clear();
    }

    // Replay the command's log in reverse inside a fresh scope; the batch the
    // replay captures is the compensation of the compensation and replaces
    // the command's log.
    fn invert(&mut self, mut command: Command, layer: &mut Layer) -> Command {
        {
            let _scope = EditScope::new(&self.router);
            command.inverse.replay(layer);
        }
        command.inverse = self.collect_batch();
        command
    }

    // Collect the batch the scope just emitted. Drains defensively: if more
    // than one batch is somehow waiting they are spliced in capture order.
    fn collect_batch(&mut self) -> InverseLog {
        let mut log = InverseLog::default();
        while let Ok(batch) = self.batches.try_recv() {
            log.adopt(batch.log);
        }
        log
    }
}
