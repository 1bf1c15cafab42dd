//! # State delegates
//!
//! A layer may carry one [`StateDelegate`], which observes every primitive
//! mutation before it is applied. The layer hands the delegate a reference to
//! its *pre-mutation* state along with the mutation arguments, so the
//! delegate can read whatever prior values it needs (old field value,
//! existed-before flag, subtree contents about to be deleted).
//!
//! Observation is not a veto: a delegate cannot block or alter the edit.
//! The undo engine attaches its interceptor through this trait
//! ([`crate::undo::UndoDelegate`]); anything else that wants cheap
//! change-tracking (dirty flags, change logs) can implement it too.

use super::{Layer, SpecType};
use crate::path::SpecPath;
use crate::value::{TimeCode, Value};

/// Per-layer mutation observer.
///
/// Each `on_*` hook fires exactly once per primitive mutation, after the
/// mutation has been validated but before the layer state changes. `new`
/// arguments are `None` where the mutation clears rather than sets.
pub trait StateDelegate {
    fn on_create_spec(&mut self, layer: &Layer, path: &SpecPath, ty: SpecType);
    /// The spec at `path` and its entire subtree are about to be removed.
    fn on_delete_spec(&mut self, layer: &Layer, path: &SpecPath);
    fn on_move_spec(&mut self, layer: &Layer, old_path: &SpecPath, new_path: &SpecPath);
    fn on_set_field(&mut self, layer: &Layer, path: &SpecPath, field: &str, new: Option<&Value>);
    fn on_set_field_dict_key(
        &mut self,
        layer: &Layer,
        path: &SpecPath,
        field: &str,
        key: &str,
        new: Option<&Value>,
    );
    fn on_set_time_sample(
        &mut self,
        layer: &Layer,
        path: &SpecPath,
        time: TimeCode,
        new: Option<&Value>,
    );
    fn on_push_child(&mut self, layer: &Layer, parent: &SpecPath, field: &str, value: &Value);
    /// The last element of the list field `field` on `parent` is about to be
    /// removed. The outgoing value is still readable through `layer`.
    fn on_pop_child(&mut self, layer: &Layer, parent: &SpecPath, field: &str);

    /// Whether any mutation has been observed since the last [`Self::mark_clean`].
    fn is_dirty(&self) -> bool;
    fn mark_clean(&mut self);
}
