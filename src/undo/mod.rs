//! # Undo
//!
//! The transactional undo/redo engine. Low-level mutations to a tracked
//! [`Layer`](crate::layer::Layer) are intercepted and turned into
//! compensating operations automatically - command authors never hand-write
//! undo logic.
//!
//! The chain of triggers, in order:
//!
//! layer edit → [`StateDelegate`](crate::layer::delegate::StateDelegate) hook
//! → [`UndoDelegate`] → [`UndoRouter`] pending log → outermost [`EditScope`]
//! closes → [`CompletedBatch`] to the subscriber → adopted as a
//! [`Command`](crate::commands::Command).
//!
//! Everything here is synchronous and single-writer: one logical editing
//! thread opens scopes, edits, and replays. Re-entrant edits made while a
//! replay is in flight are handled with [`MuteScope`], not locking.

pub mod delegate;
pub mod inverse;
pub mod router;
pub mod scope;

pub use delegate::UndoDelegate;
pub use inverse::{InverseLog, InverseOp};
pub use router::{CompletedBatch, UndoRouter};
pub use scope::{EditScope, MuteScope};
