use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity handle used as a cache key.
///
/// A `Key` wraps any shared value and compares by reference identity, never
/// by content: two keys are equal iff they point at the same allocation.
/// This matches how the cache addresses logical entities (a project handle,
/// a document handle, an options bag) — the cache never introspects the
/// value behind the key.
///
/// Cloning a `Key` clones the handle, not the value, so a key stays valid
/// and stable for as long as any clone of it is alive.
#[derive(Clone)]
pub struct Key(Arc<dyn Any + Send + Sync>);

impl Key {
    /// Wrap a shared value as an identity key.
    pub fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    /// Borrow the keyed value, if it is a `T`.
    ///
    /// Constructor callbacks occasionally want the value back; the cache
    /// itself never calls this.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    // Data-pointer address. Comparing thin addresses (rather than fat
    // `Arc::ptr_eq`) keeps equality independent of which vtable a key was
    // wrapped through.
    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.addr());
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:#x})", self.addr())
    }
}

/// Registration identity for a pinned snapshot.
///
/// Assigned by the embedder (typically a remote scope id) when pinning a
/// snapshot in the [`SnapshotRegistry`](crate::SnapshotRegistry).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SnapshotId(u64);

impl SnapshotId {
    /// Wrap a caller-assigned id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id value.
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_is_by_identity_not_content() {
        let a = Arc::new(String::from("same"));
        let b = Arc::new(String::from("same"));
        let key_a = Key::new(a.clone());
        let key_b = Key::new(b);
        assert_ne!(key_a, key_b);
        assert_eq!(key_a, Key::new(a));
    }

    #[test]
    fn clones_are_equal() {
        let key = Key::new(Arc::new(42u32));
        assert_eq!(key, key.clone());
    }

    #[test]
    fn usable_as_map_key() {
        let key = Key::new(Arc::new("doc"));
        let mut set = HashSet::new();
        set.insert(key.clone());
        assert!(set.contains(&key));
        assert!(!set.contains(&Key::new(Arc::new("doc"))));
    }

    #[test]
    fn downcast_returns_value() {
        let key = Key::new(Arc::new(String::from("text")));
        assert_eq!(key.downcast_ref::<String>().unwrap(), "text");
        assert!(key.downcast_ref::<u32>().is_none());
    }
}
