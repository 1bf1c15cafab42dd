//! # Layers
//!
//! The hierarchical store the undo engine tracks. A layer holds specs keyed
//! by [`SpecPath`]; each spec has a type, named fields, and time samples.
//! All mutation goes through the primitive API here, which is what makes
//! automatic inverse capture possible: every primitive validates, notifies
//! the attached [`delegate::StateDelegate`] with pre-mutation state, then
//! applies. Replaying an inverse goes through these same primitives, so the
//! replay is itself observed and captured.

pub mod delegate;

use std::collections::BTreeMap;

use crate::path::SpecPath;
use crate::value::{TimeCode, Value};
use delegate::StateDelegate;

pub type LayerId = crate::id::EphemeralId<Layer>;

/// The kind of node a spec represents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SpecType {
    Prim,
    Attribute,
    Relationship,
    Variant,
}

/// One node of the hierarchy: a type, named fields, and time samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Spec {
    ty: SpecType,
    fields: hashbrown::HashMap<String, Value>,
    samples: BTreeMap<TimeCode, Value>,
}
impl Spec {
    fn new(ty: SpecType) -> Self {
        Self {
            ty,
            fields: hashbrown::HashMap::new(),
            samples: BTreeMap::new(),
        }
    }
}

/// A value-typed copy of one spec, tagged with its path. Holds no references
/// into the layer, so it stays valid after the spec is destroyed - this is
/// what delete inverses carry.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecSnapshot {
    pub path: SpecPath,
    pub ty: SpecType,
    /// Sorted by field name for deterministic comparison.
    pub fields: Vec<(String, Value)>,
    pub samples: Vec<(TimeCode, Value)>,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LayerError {
    #[error("no spec at {0}")]
    NotFound(SpecPath),
    #[error("spec already exists at {0}")]
    AlreadyExists(SpecPath),
    #[error("parent spec missing for {0}")]
    OrphanPath(SpecPath),
    #[error("the root spec cannot be {0}")]
    RootImmutable(&'static str),
    #[error("cannot move {0} into its own subtree at {1}")]
    RecursiveMove(SpecPath, SpecPath),
    #[error("no field {field:?} on {path}")]
    FieldNotFound { path: SpecPath, field: String },
    #[error("field {field:?} on {path} is not a {expected}, found {found}")]
    FieldKindMismatch {
        path: SpecPath,
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("no key {key:?} in dict field {field:?} on {path}")]
    KeyNotFound {
        path: SpecPath,
        field: String,
        key: String,
    },
    #[error("no time sample at {time} on {path}")]
    SampleNotFound { path: SpecPath, time: TimeCode },
    #[error("child list {field:?} on {path} is empty")]
    EmptyChildList { path: SpecPath, field: String },
}

/// A hierarchical spec store with an optional mutation observer.
///
/// The root spec `/` always exists and can be neither deleted nor moved.
pub struct Layer {
    id: LayerId,
    specs: hashbrown::HashMap<SpecPath, Spec>,
    delegate: Option<Box<dyn StateDelegate>>,
}

impl Default for Layer {
    fn default() -> Self {
        let mut specs = hashbrown::HashMap::new();
        specs.insert(SpecPath::root(), Spec::new(SpecType::Prim));
        Self {
            id: LayerId::default(),
            specs,
            delegate: None,
        }
    }
}

impl Layer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Attach a mutation observer, replacing and returning any previous one.
    pub fn set_delegate(
        &mut self,
        delegate: Box<dyn StateDelegate>,
    ) -> Option<Box<dyn StateDelegate>> {
        self.delegate.replace(delegate)
    }
    pub fn take_delegate(&mut self) -> Option<Box<dyn StateDelegate>> {
        self.delegate.take()
    }
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.delegate.as_ref().is_some_and(|d| d.is_dirty())
    }
    pub fn mark_clean(&mut self) {
        if let Some(delegate) = &mut self.delegate {
            delegate.mark_clean();
        }
    }

    // The delegate is taken out for the duration of the callback so it can be
    // handed `&self` without aliasing the `&mut self` the mutation holds.
    fn with_delegate<F: FnOnce(&mut dyn StateDelegate, &Self)>(&mut self, notify: F) {
        if let Some(mut delegate) = self.delegate.take() {
            notify(&mut *delegate, self);
            self.delegate = Some(delegate);
        }
    }

    // --- queries ---

    #[must_use]
    pub fn has_spec(&self, path: &SpecPath) -> bool {
        self.specs.contains_key(path)
    }
    #[must_use]
    pub fn spec_type(&self, path: &SpecPath) -> Option<SpecType> {
        self.specs.get(path).map(|spec| spec.ty)
    }
    #[must_use]
    pub fn spec_count(&self) -> usize {
        self.specs.len()
    }
    #[must_use]
    pub fn field(&self, path: &SpecPath, field: &str) -> Option<&Value> {
        self.specs.get(path)?.fields.get(field)
    }
    #[must_use]
    pub fn field_dict_key(&self, path: &SpecPath, field: &str, key: &str) -> Option<&Value> {
        self.field(path, field)?.as_dict()?.get(key)
    }
    #[must_use]
    pub fn time_sample(&self, path: &SpecPath, time: TimeCode) -> Option<&Value> {
        self.specs.get(path)?.samples.get(&time)
    }
    /// Paths of the direct children of `path`, unordered.
    pub fn children(&self, path: &SpecPath) -> impl Iterator<Item = &SpecPath> + '_ {
        let depth = path.depth() + 1;
        let parent = path.clone();
        self.specs
            .keys()
            .filter(move |candidate| candidate.depth() == depth && parent.is_ancestor_of(candidate))
    }

    /// Value-typed copy of the spec at `path` and all its descendants,
    /// ancestors first. None if there is no such spec.
    #[must_use]
    pub fn subtree_snapshot(&self, path: &SpecPath) -> Option<Vec<SpecSnapshot>> {
        if !self.specs.contains_key(path) {
            return None;
        }
        let mut snapshots: Vec<SpecSnapshot> = self
            .specs
            .iter()
            .filter(|&(candidate, _)| candidate == path || path.is_ancestor_of(candidate))
            .map(|(path, spec)| Self::snapshot_one(path, spec))
            .collect();
        snapshots.sort_by(|a, b| a.path.cmp(&b.path));
        Some(snapshots)
    }
    /// Snapshot of the whole layer, ancestors first. Two layers with equal
    /// snapshots hold identical document state.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SpecSnapshot> {
        // Root always exists.
        self.subtree_snapshot(&SpecPath::root()).unwrap_or_default()
    }
    fn snapshot_one(path: &SpecPath, spec: &Spec) -> SpecSnapshot {
        let mut fields: Vec<(String, Value)> = spec
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        SpecSnapshot {
            path: path.clone(),
            ty: spec.ty,
            fields,
            samples: spec
                .samples
                .iter()
                .map(|(time, value)| (*time, value.clone()))
                .collect(),
        }
    }

    // --- primitive mutations ---
    // Each one: validate, notify the delegate with pre-mutation state, apply.

    pub fn create_spec(&mut self, path: &SpecPath, ty: SpecType) -> Result<(), LayerError> {
        if path.is_root() || self.specs.contains_key(path) {
            return Err(LayerError::AlreadyExists(path.clone()));
        }
        let Ok(parent) = path.parent() else {
            // Non-root checked above.
            return Err(LayerError::AlreadyExists(path.clone()));
        };
        if !self.specs.contains_key(&parent) {
            return Err(LayerError::OrphanPath(path.clone()));
        }
        self.with_delegate(|delegate, layer| delegate.on_create_spec(layer, path, ty));
        self.specs.insert(path.clone(), Spec::new(ty));
        Ok(())
    }

    /// Remove the spec at `path` and its entire subtree.
    pub fn delete_spec(&mut self, path: &SpecPath) -> Result<(), LayerError> {
        if path.is_root() {
            return Err(LayerError::RootImmutable("deleted"));
        }
        if !self.specs.contains_key(path) {
            return Err(LayerError::NotFound(path.clone()));
        }
        self.with_delegate(|delegate, layer| delegate.on_delete_spec(layer, path));
        self.specs
            .retain(|candidate, _| candidate != path && !path.is_ancestor_of(candidate));
        Ok(())
    }

    /// Rekey the spec at `old_path` and its subtree to live under `new_path`.
    pub fn move_spec(&mut self, old_path: &SpecPath, new_path: &SpecPath) -> Result<(), LayerError> {
        if old_path.is_root() {
            return Err(LayerError::RootImmutable("moved"));
        }
        if !self.specs.contains_key(old_path) {
            return Err(LayerError::NotFound(old_path.clone()));
        }
        if new_path.is_root() || self.specs.contains_key(new_path) {
            return Err(LayerError::AlreadyExists(new_path.clone()));
        }
        if old_path == new_path || old_path.is_ancestor_of(new_path) {
            return Err(LayerError::RecursiveMove(old_path.clone(), new_path.clone()));
        }
        let Ok(new_parent) = new_path.parent() else {
            // Non-root checked above.
            return Err(LayerError::AlreadyExists(new_path.clone()));
        };
        if !self.specs.contains_key(&new_parent) {
            return Err(LayerError::OrphanPath(new_path.clone()));
        }
        self.with_delegate(|delegate, layer| delegate.on_move_spec(layer, old_path, new_path));

        let moved: Vec<SpecPath> = self
            .specs
            .keys()
            .filter(|candidate| *candidate == old_path || old_path.is_ancestor_of(candidate))
            .cloned()
            .collect();
        for source in moved {
            if let Some(spec) = self.specs.remove(&source) {
                // reparented() is Some for every key the filter admitted.
                if let Some(target) = source.reparented(old_path, new_path) {
                    self.specs.insert(target, spec);
                }
            }
        }
        Ok(())
    }

    pub fn set_field(
        &mut self,
        path: &SpecPath,
        field: &str,
        value: Value,
    ) -> Result<(), LayerError> {
        if !self.specs.contains_key(path) {
            return Err(LayerError::NotFound(path.clone()));
        }
        self.with_delegate(|delegate, layer| {
            delegate.on_set_field(layer, path, field, Some(&value));
        });
        if let Some(spec) = self.specs.get_mut(path) {
            spec.fields.insert(field.to_owned(), value);
        }
        Ok(())
    }

    pub fn clear_field(&mut self, path: &SpecPath, field: &str) -> Result<(), LayerError> {
        let spec = self
            .specs
            .get(path)
            .ok_or_else(|| LayerError::NotFound(path.clone()))?;
        if !spec.fields.contains_key(field) {
            return Err(LayerError::FieldNotFound {
                path: path.clone(),
                field: field.to_owned(),
            });
        }
        self.with_delegate(|delegate, layer| delegate.on_set_field(layer, path, field, None));
        if let Some(spec) = self.specs.get_mut(path) {
            spec.fields.remove(field);
        }
        Ok(())
    }

    /// Set one entry of a dictionary-valued field, creating the dictionary if
    /// the field does not exist yet.
    pub fn set_field_dict_key(
        &mut self,
        path: &SpecPath,
        field: &str,
        key: &str,
        value: Value,
    ) -> Result<(), LayerError> {
        let spec = self
            .specs
            .get(path)
            .ok_or_else(|| LayerError::NotFound(path.clone()))?;
        if let Some(existing) = spec.fields.get(field) {
            if existing.as_dict().is_none() {
                return Err(LayerError::FieldKindMismatch {
                    path: path.clone(),
                    field: field.to_owned(),
                    expected: "dict",
                    found: existing.kind(),
                });
            }
        }
        self.with_delegate(|delegate, layer| {
            delegate.on_set_field_dict_key(layer, path, field, key, Some(&value));
        });
        if let Some(spec) = self.specs.get_mut(path) {
            let dict = spec
                .fields
                .entry(field.to_owned())
                .or_insert_with(|| Value::Dict(hashbrown::HashMap::new()));
            // Kind checked above.
            if let Some(entries) = dict.as_dict_mut() {
                entries.insert(key.to_owned(), value);
            }
        }
        Ok(())
    }

    /// Remove one entry of a dictionary-valued field. The field itself is
    /// removed when its last entry goes, so the inverse of the first
    /// `set_field_dict_key` restores the field's absence exactly.
    pub fn clear_field_dict_key(
        &mut self,
        path: &SpecPath,
        field: &str,
        key: &str,
    ) -> Result<(), LayerError> {
        let spec = self
            .specs
            .get(path)
            .ok_or_else(|| LayerError::NotFound(path.clone()))?;
        let existing = spec.fields.get(field).ok_or_else(|| LayerError::FieldNotFound {
            path: path.clone(),
            field: field.to_owned(),
        })?;
        let Some(entries) = existing.as_dict() else {
            return Err(LayerError::FieldKindMismatch {
                path: path.clone(),
                field: field.to_owned(),
                expected: "dict",
                found: existing.kind(),
            });
        };
        if !entries.contains_key(key) {
            return Err(LayerError::KeyNotFound {
                path: path.clone(),
                field: field.to_owned(),
                key: key.to_owned(),
            });
        }
        self.with_delegate(|delegate, layer| {
            delegate.on_set_field_dict_key(layer, path, field, key, None);
        });
        if let Some(spec) = self.specs.get_mut(path) {
            let emptied = spec
                .fields
                .get_mut(field)
                .and_then(Value::as_dict_mut)
                .map(|entries| {
                    entries.remove(key);
                    entries.is_empty()
                })
                .unwrap_or(false);
            if emptied {
                spec.fields.remove(field);
            }
        }
        Ok(())
    }

    pub fn set_time_sample(
        &mut self,
        path: &SpecPath,
        time: TimeCode,
        value: Value,
    ) -> Result<(), LayerError> {
        if !self.specs.contains_key(path) {
            return Err(LayerError::NotFound(path.clone()));
        }
        self.with_delegate(|delegate, layer| {
            delegate.on_set_time_sample(layer, path, time, Some(&value));
        });
        if let Some(spec) = self.specs.get_mut(path) {
            spec.samples.insert(time, value);
        }
        Ok(())
    }

    pub fn clear_time_sample(&mut self, path: &SpecPath, time: TimeCode) -> Result<(), LayerError> {
        let spec = self
            .specs
            .get(path)
            .ok_or_else(|| LayerError::NotFound(path.clone()))?;
        if !spec.samples.contains_key(&time) {
            return Err(LayerError::SampleNotFound {
                path: path.clone(),
                time,
            });
        }
        self.with_delegate(|delegate, layer| delegate.on_set_time_sample(layer, path, time, None));
        if let Some(spec) = self.specs.get_mut(path) {
            spec.samples.remove(&time);
        }
        Ok(())
    }

    /// Append `value` to the list field `field` on `parent`, creating the
    /// list if the field does not exist yet.
    pub fn push_child(
        &mut self,
        parent: &SpecPath,
        field: &str,
        value: Value,
    ) -> Result<(), LayerError> {
        let spec = self
            .specs
            .get(parent)
            .ok_or_else(|| LayerError::NotFound(parent.clone()))?;
        if let Some(existing) = spec.fields.get(field) {
            if existing.as_list().is_none() {
                return Err(LayerError::FieldKindMismatch {
                    path: parent.clone(),
                    field: field.to_owned(),
                    expected: "list",
                    found: existing.kind(),
                });
            }
        }
        self.with_delegate(|delegate, layer| {
            delegate.on_push_child(layer, parent, field, &value);
        });
        if let Some(spec) = self.specs.get_mut(parent) {
            let list = spec
                .fields
                .entry(field.to_owned())
                .or_insert_with(|| Value::List(Vec::new()));
            // Kind checked above.
            if let Some(items) = list.as_list_mut() {
                items.push(value);
            }
        }
        Ok(())
    }

    /// Remove and return the last element of the list field `field` on
    /// `parent`. The field itself is removed when its last element goes, so
    /// the inverse of the first `push_child` restores the field's absence
    /// exactly.
    pub fn pop_child(&mut self, parent: &SpecPath, field: &str) -> Result<Value, LayerError> {
        let spec = self
            .specs
            .get(parent)
            .ok_or_else(|| LayerError::NotFound(parent.clone()))?;
        let existing = spec.fields.get(field).ok_or_else(|| LayerError::FieldNotFound {
            path: parent.clone(),
            field: field.to_owned(),
        })?;
        let Some(items) = existing.as_list() else {
            return Err(LayerError::FieldKindMismatch {
                path: parent.clone(),
                field: field.to_owned(),
                expected: "list",
                found: existing.kind(),
            });
        };
        if items.is_empty() {
            return Err(LayerError::EmptyChildList {
                path: parent.clone(),
                field: field.to_owned(),
            });
        }
        self.with_delegate(|delegate, layer| delegate.on_pop_child(layer, parent, field));
        let mut popped = None;
        if let Some(spec) = self.specs.get_mut(parent) {
            let emptied = spec
                .fields
                .get_mut(field)
                .and_then(Value::as_list_mut)
                .map(|items| {
                    popped = items.pop();
                    items.is_empty()
                })
                .unwrap_or(false);
            if emptied {
                spec.fields.remove(field);
            }
        }
        // Checked non-empty above.
        popped.ok_or_else(|| LayerError::EmptyChildList {
            path: parent.clone(),
            field: field.to_owned(),
        })
    }
}
