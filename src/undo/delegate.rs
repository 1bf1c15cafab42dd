//! # The undo interceptor
//!
//! [`UndoDelegate`] attaches to one layer (via
//! [`UndoRouter::track_layer`](super::UndoRouter::track_layer)) and turns
//! every primitive mutation it observes into exactly one compensating
//! [`InverseOp`], appended to the router's open transaction. It reads the
//! pre-mutation state it needs from the layer reference the hook provides -
//! the mutation has not happened yet when the hook fires.
//!
//! Interception is purely observational; the underlying mutation always
//! proceeds.

use super::inverse::InverseOp;
use super::router::UndoRouter;
use crate::layer::delegate::StateDelegate;
use crate::layer::{Layer, SpecType};
use crate::path::SpecPath;
use crate::value::{TimeCode, Value};

pub struct UndoDelegate {
    router: UndoRouter,
    dirty: bool,
}

impl UndoDelegate {
    #[must_use]
    pub fn new(router: UndoRouter) -> Self {
        Self {
            router,
            dirty: false,
        }
    }
}

impl StateDelegate for UndoDelegate {
    fn on_create_spec(&mut self, _layer: &Layer, path: &SpecPath, _ty: SpecType) {
        self.dirty = true;
        if self.router.is_muted() {
            return;
        }
        self.router.append(InverseOp::DeleteSpec { path: path.clone() });
    }

    fn on_delete_spec(&mut self, layer: &Layer, path: &SpecPath) {
        self.dirty = true;
        if self.router.is_muted() {
            return;
        }
        // Deep value-typed copy of the doomed subtree, while it still exists.
        let Some(specs) = layer.subtree_snapshot(path) else {
            // The layer validated existence before notifying.
            log::error!("delete hook fired for missing spec {path}");
            return;
        };
        self.router.append(InverseOp::RestoreSpecs { specs });
    }

    fn on_move_spec(&mut self, _layer: &Layer, old_path: &SpecPath, new_path: &SpecPath) {
        self.dirty = true;
        if self.router.is_muted() {
            return;
        }
        self.router.append(InverseOp::MoveSpec {
            from: new_path.clone(),
            to: old_path.clone(),
        });
    }

    fn on_set_field(&mut self, layer: &Layer, path: &SpecPath, field: &str, _new: Option<&Value>) {
        self.dirty = true;
        if self.router.is_muted() {
            return;
        }
        let value = layer.field(path, field).cloned();
        self.router.append(InverseOp::SetField {
            path: path.clone(),
            field: field.to_owned(),
            value,
        });
    }

    fn on_set_field_dict_key(
        &mut self,
        layer: &Layer,
        path: &SpecPath,
        field: &str,
        key: &str,
        _new: Option<&Value>,
    ) {
        self.dirty = true;
        if self.router.is_muted() {
            return;
        }
        let value = layer.field_dict_key(path, field, key).cloned();
        self.router.append(InverseOp::SetFieldDictKey {
            path: path.clone(),
            field: field.to_owned(),
            key: key.to_owned(),
            value,
        });
    }

    fn on_set_time_sample(
        &mut self,
        layer: &Layer,
        path: &SpecPath,
        time: TimeCode,
        _new: Option<&Value>,
    ) {
        self.dirty = true;
        if self.router.is_muted() {
            return;
        }
        let value = layer.time_sample(path, time).cloned();
        self.router.append(InverseOp::SetTimeSample {
            path: path.clone(),
            time,
            value,
        });
    }

    fn on_push_child(&mut self, _layer: &Layer, parent: &SpecPath, field: &str, _value: &Value) {
        self.dirty = true;
        if self.router.is_muted() {
            return;
        }
        self.router.append(InverseOp::PopChild {
            parent: parent.clone(),
            field: field.to_owned(),
        });
    }

    fn on_pop_child(&mut self, layer: &Layer, parent: &SpecPath, field: &str) {
        self.dirty = true;
        if self.router.is_muted() {
            return;
        }
        let Some(value) = layer
            .field(parent, field)
            .and_then(Value::as_list)
            .and_then(<[Value]>::last)
            .cloned()
        else {
            // The layer validated a non-empty list before notifying.
            log::error!("pop hook fired for empty child list {parent}.{field}");
            return;
        };
        self.router.append(InverseOp::PushChild {
            parent: parent.clone(),
            field: field.to_owned(),
            value,
        });
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }
    fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use crate::layer::{Layer, SpecType};
    use crate::path::SpecPath;
    use crate::undo::inverse::InverseOp;
    use crate::undo::router::UndoRouter;
    use crate::undo::scope::{EditScope, MuteScope};
    use crate::value::{TimeCode, Value};

    fn path(s: &str) -> SpecPath {
        s.parse().unwrap()
    }
    fn tracked() -> (UndoRouter, Layer) {
        let router = UndoRouter::new();
        let mut layer = Layer::new();
        router.track_layer(&mut layer);
        (router, layer)
    }

    #[test]
    fn one_op_per_primitive_mutation() {
        let (router, mut layer) = tracked();
        let batches = router.subscribe();
        {
            let _scope = EditScope::new(&router);
            layer.create_spec(&path("/A"), SpecType::Attribute).unwrap();
            layer.set_field(&path("/A"), "size", Value::Float(1.0)).unwrap();
            layer
                .set_time_sample(&path("/A"), TimeCode(0.0), Value::Float(0.1))
                .unwrap();
            layer
                .push_child(&SpecPath::root(), "childOrder", Value::token("A"))
                .unwrap();
        }
        let log = batches.try_recv().unwrap().log;
        let ops: Vec<_> = log.iter().collect();
        assert_eq!(ops.len(), 4);
        assert!(matches!(ops[0], InverseOp::DeleteSpec { .. }));
        assert!(matches!(
            ops[1],
            InverseOp::SetField { value: None, .. } // field did not exist before
        ));
        assert!(matches!(ops[2], InverseOp::SetTimeSample { value: None, .. }));
        assert!(matches!(ops[3], InverseOp::PopChild { .. }));
    }

    #[test]
    fn set_field_captures_prior_value() {
        let (router, mut layer) = tracked();
        let batches = router.subscribe();
        {
            let _scope = EditScope::new(&router);
            layer.create_spec(&path("/A"), SpecType::Attribute).unwrap();
            layer.set_field(&path("/A"), "size", Value::Float(1.0)).unwrap();
        }
        let _ = batches.try_recv().unwrap();
        {
            let _scope = EditScope::new(&router);
            layer.set_field(&path("/A"), "size", Value::Float(2.0)).unwrap();
        }
        let log = batches.try_recv().unwrap().log;
        let ops: Vec<_> = log.iter().collect();
        assert_eq!(
            ops,
            vec![&InverseOp::SetField {
                path: path("/A"),
                field: "size".into(),
                value: Some(Value::Float(1.0)),
            }]
        );
    }

    #[test]
    fn delete_captures_whole_subtree() {
        let (router, mut layer) = tracked();
        let batches = router.subscribe();
        {
            let _scope = EditScope::new(&router);
            layer.create_spec(&path("/A"), SpecType::Prim).unwrap();
            layer.create_spec(&path("/A/B"), SpecType::Attribute).unwrap();
            layer.set_field(&path("/A/B"), "size", Value::Int(3)).unwrap();
        }
        let _ = batches.try_recv().unwrap();
        {
            let _scope = EditScope::new(&router);
            layer.delete_spec(&path("/A")).unwrap();
        }
        let log = batches.try_recv().unwrap().log;
        assert_eq!(log.len(), 1);
        let Some(InverseOp::RestoreSpecs { specs }) = log.iter().next() else {
            panic!("expected a single RestoreSpecs");
        };
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].path, path("/A"));
        assert_eq!(specs[1].path, path("/A/B"));
        assert_eq!(specs[1].fields, vec![("size".to_owned(), Value::Int(3))]);
    }

    #[test]
    fn muted_mutations_record_nothing() {
        let (router, mut layer) = tracked();
        let batches = router.subscribe();
        {
            let _scope = EditScope::new(&router);
            let _mute = MuteScope::new(&router);
            layer.create_spec(&path("/A"), SpecType::Prim).unwrap();
            layer.set_field(&path("/A"), "size", Value::Int(1)).unwrap();
        }
        assert!(batches.try_recv().is_err());
        // The mutation itself still happened, and the layer is still dirty.
        assert!(layer.has_spec(&path("/A")));
        assert!(layer.is_dirty());
    }

    #[test]
    fn unscoped_edit_is_reported_not_captured() {
        let (router, mut layer) = tracked();
        let batches = router.subscribe();
        // No scope open: the edit proceeds but its inverse is dropped.
        layer.create_spec(&path("/A"), SpecType::Prim).unwrap();
        assert!(layer.has_spec(&path("/A")));
        {
            let _scope = EditScope::new(&router);
            layer.set_field(&path("/A"), "size", Value::Int(1)).unwrap();
        }
        // Only the scoped edit made it into a batch.
        assert_eq!(batches.try_recv().unwrap().log.len(), 1);
    }
}
