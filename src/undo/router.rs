//! # The undo router
//!
//! Process-wide coordination point for edit tracking. Every tracked layer's
//! interceptor appends compensations here; every [`EditScope`] opens and
//! closes against it. The router keeps one linear pending buffer regardless
//! of scope nesting, so ops from inner scopes land in the outer batch exactly
//! where they were captured.
//!
//! Unlike a hidden singleton, the router is an explicit object constructed
//! once at application start; handles are cheap clones sharing the same
//! state, which makes the single-writer assumption a visible contract of
//! whoever owns the handle.
//!
//! [`EditScope`]: super::EditScope

use std::sync::Arc;

use super::inverse::{InverseLog, InverseOp};
use crate::layer::delegate::StateDelegate;
use crate::layer::Layer;

/// A finalized non-empty batch, emitted when the outermost scope closes.
#[derive(Debug)]
pub struct CompletedBatch {
    pub log: InverseLog,
}

#[derive(Default)]
struct RouterState {
    /// Currently open scopes.
    depth: u32,
    /// Suppression nesting. Mutations observed while muted are not recorded.
    mute_depth: u32,
    /// Accumulator for the open transaction.
    pending: InverseLog,
}

struct RouterShared {
    state: parking_lot::Mutex<RouterState>,
    // Single consumer. Completed batches go here; if nobody subscribed they
    // are dropped with a warning.
    batches: parking_lot::Mutex<Option<std::sync::mpsc::Sender<CompletedBatch>>>,
}

/// Cheaply cloneable handle to the shared tracking state.
#[derive(Clone)]
pub struct UndoRouter {
    shared: Arc<RouterShared>,
}

impl Default for UndoRouter {
    fn default() -> Self {
        Self {
            shared: Arc::new(RouterShared {
                state: parking_lot::Mutex::default(),
                batches: parking_lot::Mutex::new(None),
            }),
        }
    }
}

impl UndoRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an undo interceptor to `layer`, routed to this router.
    /// Returns the layer's previous delegate, if it had one.
    pub fn track_layer(&self, layer: &mut Layer) -> Option<Box<dyn StateDelegate>> {
        layer.set_delegate(Box::new(super::delegate::UndoDelegate::new(self.clone())))
    }

    /// Subscribe the single batch consumer. A later call replaces the
    /// previous subscription, disconnecting its receiver.
    pub fn subscribe(&self) -> std::sync::mpsc::Receiver<CompletedBatch> {
        let (sender, receiver) = std::sync::mpsc::channel();
        *self.shared.batches.lock() = Some(sender);
        receiver
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.shared.state.lock().depth
    }
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.shared.state.lock().mute_depth > 0
    }

    /// Begin observing mutations without recording them. Nests.
    pub fn mute(&self) {
        self.shared.state.lock().mute_depth += 1;
    }
    /// Undo one level of [`Self::mute`]. Unmuting below zero is a coding
    /// error: logged and clamped.
    pub fn unmute(&self) {
        let mut state = self.shared.state.lock();
        if state.mute_depth == 0 {
            log::error!("unmute without matching mute");
        } else {
            state.mute_depth -= 1;
        }
    }

    /// Open one scope level.
    ///
    /// Leftover pending ops at depth zero mean a previous transaction never
    /// got collected (a fragmented edit). With `clear` the leftovers are
    /// discarded silently - the caller is deliberately recovering; without
    /// it they are discarded noisily as a coding error.
    pub(crate) fn open(&self, clear: bool) {
        let mut state = self.shared.state.lock();
        if state.depth == 0 && !state.pending.is_empty() {
            if clear {
                log::debug!(
                    "discarding {} stale pending ops on scope open",
                    state.pending.len()
                );
            } else {
                log::error!(
                    "opening a fragmented transaction: {} pending ops were never \
                     collected and will be lost to undo",
                    state.pending.len()
                );
            }
            state.pending.clear();
        }
        state.depth += 1;
        log::trace!("opened scope at depth {}", state.depth);
    }

    /// Close one scope level. Returns the accumulated log (possibly empty)
    /// when the outermost scope closes, None otherwise. Closing at depth
    /// zero is a coding error: logged, no underflow.
    pub(crate) fn close(&self) -> Option<InverseLog> {
        let mut state = self.shared.state.lock();
        if state.depth == 0 {
            log::error!("scope close without matching open");
            return None;
        }
        state.depth -= 1;
        log::trace!("closed scope at depth {}", state.depth);
        (state.depth == 0).then(|| std::mem::take(&mut state.pending))
    }

    /// Record one compensation into the open transaction.
    ///
    /// Muted: dropped silently. No open scope: the mutation is an unscoped
    /// edit that future undo cannot see - a coding error; the loose op is
    /// dropped rather than corrupting the next batch.
    pub(crate) fn append(&self, op: InverseOp) {
        let mut state = self.shared.state.lock();
        if state.mute_depth > 0 {
            return;
        }
        if state.depth == 0 {
            log::error!("unscoped edit: inverse op captured outside any scope, dropping {op:?}");
            return;
        }
        state.pending.push(op);
    }

    /// Hand a finalized batch to the subscriber, if any.
    pub(crate) fn emit(&self, log: InverseLog) {
        let ops = log.len();
        let mut sender = self.shared.batches.lock();
        let delivered = match &*sender {
            Some(subscriber) => subscriber.send(CompletedBatch { log }).is_ok(),
            None => false,
        };
        if !delivered {
            // Receiver gone means the subscription is dead; drop it too.
            *sender = None;
            log::warn!("completed batch of {ops} ops was not adopted, discarding");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::inverse::InverseOp;
    use super::UndoRouter;

    fn op() -> InverseOp {
        InverseOp::DeleteSpec {
            path: "/A".parse().unwrap(),
        }
    }

    #[test]
    fn balanced_nesting_keeps_one_linear_buffer() {
        let router = UndoRouter::new();
        router.open(false);
        router.append(op());
        router.open(false);
        router.append(op());
        assert!(router.close().is_none()); // inner close yields nothing
        router.append(op());
        let log = router.close().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(router.depth(), 0);
    }

    #[test]
    fn unbalanced_close_recovers() {
        let router = UndoRouter::new();
        assert!(router.close().is_none());
        assert_eq!(router.depth(), 0);
        // Still usable afterwards.
        router.open(false);
        router.append(op());
        assert_eq!(router.close().map(|log| log.len()), Some(1));
    }

    #[test]
    fn unscoped_append_is_dropped() {
        let router = UndoRouter::new();
        router.append(op());
        router.open(false);
        let log = router.close().unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn mute_nests_and_clamps() {
        let router = UndoRouter::new();
        router.mute();
        router.mute();
        router.unmute();
        assert!(router.is_muted());
        router.unmute();
        assert!(!router.is_muted());
        // Over-unmute clamps at zero.
        router.unmute();
        assert!(!router.is_muted());
        router.mute();
        assert!(router.is_muted());
        router.unmute();
    }

    #[test]
    fn muted_appends_record_nothing() {
        let router = UndoRouter::new();
        router.open(false);
        router.mute();
        router.append(op());
        router.unmute();
        router.append(op());
        assert_eq!(router.close().map(|log| log.len()), Some(1));
    }

    #[test]
    fn fragmented_pending_cleared_on_reopen() {
        // Balanced open/close always drains pending, so force the corrupted
        // state directly: leftover ops at depth zero.
        let router = UndoRouter::new();
        router.shared.state.lock().pending.push(op());
        router.open(false); // noisy recovery
        assert_eq!(router.close().map(|log| log.len()), Some(0));

        router.shared.state.lock().pending.push(op());
        router.open(true); // silent recovery, same outcome
        assert_eq!(router.close().map(|log| log.len()), Some(0));
    }

    #[test]
    fn emit_without_subscriber_discards() {
        let router = UndoRouter::new();
        let mut log = super::InverseLog::default();
        log.push(op());
        router.emit(log); // just must not panic
        let receiver = router.subscribe();
        let mut log = super::InverseLog::default();
        log.push(op());
        router.emit(log);
        assert_eq!(receiver.try_recv().unwrap().log.len(), 1);
    }
}
