//! # IDs
//!
//! Process-unique identifiers, namespaced by a marker type. Used to tell
//! tracked layers apart in diagnostics without holding references to them.
//! Order of IDs is not guaranteed, only uniqueness within one execution.

static NEXT_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

/// ID guaranteed unique within this execution of the program.
/// IDs with different marker types never compare equal, enforced at compile time.
pub struct EphemeralId<T: std::any::Any> {
    id: std::num::NonZeroU64,
    // Namespace marker
    _phantom: std::marker::PhantomData<T>,
}
impl<T: std::any::Any> Clone for EphemeralId<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: std::any::Any> Copy for EphemeralId<T> {}
impl<T: std::any::Any> PartialEq for EphemeralId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T: std::any::Any> Eq for EphemeralId<T> {}
impl<T: std::any::Any> std::hash::Hash for EphemeralId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::any::TypeId::of::<T>().hash(state);
        self.id.hash(state);
    }
}

// Safety - just a u64. If T is !Send or !Sync that would be carried over to
// the ID even though no T is ever stored.
unsafe impl<T: std::any::Any> Send for EphemeralId<T> {}
unsafe impl<T: std::any::Any> Sync for EphemeralId<T> {}

impl<T: std::any::Any> EphemeralId<T> {
    /// Get the raw numeric value of this ID.
    /// IDs from differing namespaces may share the same numeric value!
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id.get()
    }
}
impl<T: std::any::Any> Default for EphemeralId<T> {
    fn default() -> Self {
        let id = NEXT_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Self {
            // Will not wrap within the lifetime of any realistic process.
            id: std::num::NonZeroU64::new(id).expect("id counter wrapped"),
            _phantom: std::marker::PhantomData,
        }
    }
}
impl<T: std::any::Any> std::fmt::Debug for EphemeralId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let full_name = std::any::type_name::<T>();
        let short_name = full_name.rsplit("::").next().unwrap_or(full_name);
        write!(f, "{short_name}#{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    struct Marker;

    #[test]
    fn unique_per_call() {
        let a = super::EphemeralId::<Marker>::default();
        let b = super::EphemeralId::<Marker>::default();
        assert_ne!(a, b);
    }
    #[test]
    fn debug_uses_short_type_name() {
        let a = super::EphemeralId::<Marker>::default();
        assert!(format!("{a:?}").starts_with("Marker#"));
    }
}
