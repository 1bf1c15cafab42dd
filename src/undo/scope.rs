//! # Edit scopes
//!
//! Guard objects marking transaction boundaries. Opening a scope increments
//! the router's depth; dropping it decrements. Only the outermost scope
//! finalizes the batch, so arbitrarily nested scopes collapse into exactly
//! one batch containing every op in capture order.
//!
//! Closing happens in `Drop`, which also runs during panic unwinding -
//! depth can never be left permanently elevated by an early return or a
//! panic in the guarded region.

use super::router::UndoRouter;

/// Marks one transaction: every tracked mutation between construction and
/// drop lands in the same batch.
///
/// When the outermost scope drops with a non-empty batch, the batch is sent
/// to the router's subscriber (see [`UndoRouter::subscribe`]); an empty
/// batch produces no history entry at all.
#[must_use = "an edit scope tracks nothing unless it is kept alive"]
pub struct EditScope<'r> {
    router: &'r UndoRouter,
}

impl<'r> EditScope<'r> {
    pub fn new(router: &'r UndoRouter) -> Self {
        router.open(false);
        Self { router }
    }
    /// Open a scope that first discards any stale pending ops left at depth
    /// zero, without flagging them as a coding error. Intended for known
    /// recovery points (e.g. opening a fresh document), where losing a
    /// fragmented half-batch is the accepted trade.
    pub fn clearing(router: &'r UndoRouter) -> Self {
        router.open(true);
        Self { router }
    }
}

impl Drop for EditScope<'_> {
    fn drop(&mut self) {
        if let Some(log) = self.router.close() {
            if log.is_empty() {
                log::trace!("skipping empty batch");
            } else {
                self.router.emit(log);
            }
        }
    }
}

/// Suppresses inverse capture for its lifetime. Mutations still happen and
/// still notify delegates; they are just not recorded. Nests freely.
///
/// This is how replay avoids recording "undo of undo" as spurious new edits
/// outside the intended redo log, and how bulk loads skip tracking entirely.
#[must_use = "a mute scope only suppresses capture while it is alive"]
pub struct MuteScope<'r> {
    router: &'r UndoRouter,
}

impl<'r> MuteScope<'r> {
    pub fn new(router: &'r UndoRouter) -> Self {
        router.mute();
        Self { router }
    }
}
impl Drop for MuteScope<'_> {
    fn drop(&mut self) {
        self.router.unmute();
    }
}

#[cfg(test)]
mod tests {
    use super::{EditScope, MuteScope};
    use crate::undo::inverse::InverseOp;
    use crate::undo::router::UndoRouter;

    fn op() -> InverseOp {
        InverseOp::DeleteSpec {
            path: "/A".parse().unwrap(),
        }
    }

    #[test]
    fn nested_scopes_emit_one_batch() {
        let router = UndoRouter::new();
        let batches = router.subscribe();
        {
            let _outer = EditScope::new(&router);
            router.append(op());
            {
                let _inner = EditScope::new(&router);
                router.append(op());
            }
            assert!(batches.try_recv().is_err()); // inner close emits nothing
            router.append(op());
        }
        let batch = batches.try_recv().unwrap();
        assert_eq!(batch.log.len(), 3);
        assert!(batches.try_recv().is_err());
        assert_eq!(router.depth(), 0);
    }

    #[test]
    fn empty_batch_is_not_emitted() {
        let router = UndoRouter::new();
        let batches = router.subscribe();
        {
            let _scope = EditScope::new(&router);
        }
        assert!(batches.try_recv().is_err());
    }

    #[test]
    fn panic_in_scope_restores_depth() {
        let router = UndoRouter::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = EditScope::new(&router);
            router.append(op());
            panic!("mid-edit panic");
        }));
        assert!(result.is_err());
        assert_eq!(router.depth(), 0);
        // The engine is still usable for the next transaction.
        let batches = router.subscribe();
        {
            let _scope = EditScope::new(&router);
            router.append(op());
        }
        assert_eq!(batches.try_recv().unwrap().log.len(), 1);
    }

    #[test]
    fn mute_scope_suppresses_capture() {
        let router = UndoRouter::new();
        let batches = router.subscribe();
        {
            let _scope = EditScope::new(&router);
            {
                let _mute = MuteScope::new(&router);
                router.append(op());
            }
        }
        // Nothing recorded, so nothing emitted.
        assert!(batches.try_recv().is_err());
        assert!(!router.is_muted());
    }
}
