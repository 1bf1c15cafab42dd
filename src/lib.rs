//! # specstack
//!
//! A hierarchical spec store with a transactional undo/redo engine. Edits to
//! a tracked [`layer::Layer`] are intercepted at the primitive-mutation level
//! and converted into compensating operations automatically; scopes batch
//! them, the [`undo::UndoRouter`] collects them, and the
//! [`commands::CommandManager`] replays them.

pub mod commands;
pub mod id;
pub mod layer;
pub mod path;
pub mod undo;
pub mod value;
