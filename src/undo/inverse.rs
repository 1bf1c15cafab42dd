//! # Inverse logs
//!
//! An [`InverseLog`] is the ordered list of compensating operations captured
//! during one transaction. Each [`InverseOp`] undoes exactly one primitive
//! layer mutation and carries only value-typed payload - paths, field names,
//! owned values - never references into a live layer. At replay time the
//! target is looked up by path again, so a log stays valid even if the specs
//! it mentions have been destroyed and re-created in between.

use crate::layer::{Layer, LayerError, SpecSnapshot};
use crate::path::SpecPath;
use crate::value::{TimeCode, Value};

/// One compensating operation.
///
/// Replay goes through the layer's public mutation API, so applying an
/// inverse is itself observed by the layer's delegate - that is how undoing
/// a batch automatically captures the matching redo batch.
#[derive(Clone, Debug, PartialEq)]
pub enum InverseOp {
    /// Restore field `field` of `path` to `value`; `None` clears it.
    SetField {
        path: SpecPath,
        field: String,
        value: Option<Value>,
    },
    /// Restore one dictionary entry; `None` removes it.
    SetFieldDictKey {
        path: SpecPath,
        field: String,
        key: String,
        value: Option<Value>,
    },
    /// Restore the sample at `time`; `None` removes it.
    SetTimeSample {
        path: SpecPath,
        time: TimeCode,
        value: Option<Value>,
    },
    /// Undo a spec creation.
    DeleteSpec { path: SpecPath },
    /// Undo a subtree deletion. Snapshots are ordered ancestors first.
    RestoreSpecs { specs: Vec<SpecSnapshot> },
    /// Move the spec at `from` back to `to`.
    MoveSpec { from: SpecPath, to: SpecPath },
    /// Undo a child push.
    PopChild { parent: SpecPath, field: String },
    /// Undo a child pop.
    PushChild {
        parent: SpecPath,
        field: String,
        value: Value,
    },
}

impl InverseOp {
    /// Apply this single compensation to `layer`.
    pub fn apply(&self, layer: &mut Layer) -> Result<(), LayerError> {
        match self {
            Self::SetField { path, field, value } => match value {
                Some(value) => layer.set_field(path, field, value.clone()),
                None => layer.clear_field(path, field),
            },
            Self::SetFieldDictKey {
                path,
                field,
                key,
                value,
            } => match value {
                Some(value) => layer.set_field_dict_key(path, field, key, value.clone()),
                None => layer.clear_field_dict_key(path, field, key),
            },
            Self::SetTimeSample { path, time, value } => match value {
                Some(value) => layer.set_time_sample(path, *time, value.clone()),
                None => layer.clear_time_sample(path, *time),
            },
            Self::DeleteSpec { path } => layer.delete_spec(path),
            Self::RestoreSpecs { specs } => {
                // Ancestors first, so every create finds its parent.
                for snapshot in specs {
                    layer.create_spec(&snapshot.path, snapshot.ty)?;
                    for (field, value) in &snapshot.fields {
                        layer.set_field(&snapshot.path, field, value.clone())?;
                    }
                    for (time, value) in &snapshot.samples {
                        layer.set_time_sample(&snapshot.path, *time, value.clone())?;
                    }
                }
                Ok(())
            }
            Self::MoveSpec { from, to } => layer.move_spec(from, to),
            Self::PopChild { parent, field } => layer.pop_child(parent, field).map(|_| ()),
            Self::PushChild {
                parent,
                field,
                value,
            } => layer.push_child(parent, field, value.clone()),
        }
    }
}

/// Ordered sequence of compensations captured during one transaction.
///
/// Ops must be replayed in strict reverse capture order - later ops may
/// depend on structure that earlier ops created or destroyed.
#[derive(Clone, Debug, Default)]
pub struct InverseLog {
    // The common case is a one- or two-op batch (a single field edit).
    ops: smallvec::SmallVec<[InverseOp; 2]>,
}

impl InverseLog {
    pub fn push(&mut self, op: InverseOp) {
        self.ops.push(op);
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
    pub fn clear(&mut self) {
        self.ops.clear();
    }
    /// Splice another log onto the end of this one, preserving capture order.
    pub fn adopt(&mut self, other: InverseLog) {
        self.ops.extend(other.ops);
    }
    /// Ops in capture order.
    pub fn iter(&self) -> impl Iterator<Item = &InverseOp> + '_ {
        self.ops.iter()
    }
    /// Apply every op in reverse capture order.
    ///
    /// Per-op failures indicate the log no longer matches the layer - a
    /// coding error. They are logged and replay continues, per the engine's
    /// recover-don't-crash policy.
    pub fn replay(&self, layer: &mut Layer) {
        for op in self.ops.iter().rev() {
            if let Err(error) = op.apply(layer) {
                log::error!("inverse op failed during replay, state may be inexact: {error}");
            }
        }
    }
}

impl FromIterator<InverseOp> for InverseLog {
    fn from_iter<I: IntoIterator<Item = InverseOp>>(ops: I) -> Self {
        Self {
            ops: ops.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InverseLog, InverseOp};
    use crate::layer::{Layer, SpecType};
    use crate::path::SpecPath;
    use crate::value::Value;

    fn path(s: &str) -> SpecPath {
        s.parse().unwrap()
    }

    #[test]
    fn replay_runs_in_reverse_capture_order() {
        // Captured while doing: set size=1 (was absent), then size=2 (was 1).
        let mut layer = Layer::new();
        layer.create_spec(&path("/A"), SpecType::Attribute).unwrap();
        layer.set_field(&path("/A"), "size", Value::Float(2.0)).unwrap();

        let log: InverseLog = [
            InverseOp::SetField {
                path: path("/A"),
                field: "size".into(),
                value: None,
            },
            InverseOp::SetField {
                path: path("/A"),
                field: "size".into(),
                value: Some(Value::Float(1.0)),
            },
        ]
        .into_iter()
        .collect();
        log.replay(&mut layer);
        // Reverse order: restore 1.0 first, then clear - netting out to absent.
        assert_eq!(layer.field(&path("/A"), "size"), None);
    }

    #[test]
    fn restore_specs_rebuilds_subtree() {
        let mut layer = Layer::new();
        layer.create_spec(&path("/A"), SpecType::Prim).unwrap();
        layer.create_spec(&path("/A/B"), SpecType::Attribute).unwrap();
        layer.set_field(&path("/A/B"), "size", Value::Int(7)).unwrap();
        let snapshot = layer.subtree_snapshot(&path("/A")).unwrap();
        layer.delete_spec(&path("/A")).unwrap();

        let log: InverseLog = [InverseOp::RestoreSpecs { specs: snapshot }]
            .into_iter()
            .collect();
        log.replay(&mut layer);
        assert_eq!(layer.field(&path("/A/B"), "size"), Some(&Value::Int(7)));
    }

    #[test]
    fn adopt_preserves_capture_order() {
        let op = |field: &str| InverseOp::SetField {
            path: path("/A"),
            field: field.into(),
            value: None,
        };
        let mut first: InverseLog = [op("a"), op("b")].into_iter().collect();
        let second: InverseLog = [op("c")].into_iter().collect();
        first.adopt(second);
        let fields: Vec<_> = first
            .iter()
            .map(|op| match op {
                InverseOp::SetField { field, .. } => field.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }
}
