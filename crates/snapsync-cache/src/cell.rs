use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use snapsync_types::{Checksum, Kind, SharedObject};

use crate::storage::SnapshotStorage;

/// Per-key cache cell.
///
/// Most keys only ever hold a single object, so the cell stores one
/// "primary" object directly and allocates its kind/checksum indices only
/// when a second distinct kind arrives for the same key. Once the indices
/// exist, the primary object is reachable through both of them.
///
/// A cell may also own one nested [`SnapshotStorage`] holding the children
/// of a hierarchical object; it is created on demand, at most once.
pub struct ObjectCell {
    state: RwLock<CellState>,
    children: OnceLock<Arc<SnapshotStorage>>,
}

#[derive(Default)]
struct CellState {
    primary: Option<SharedObject>,
    by_kind: Option<HashMap<Kind, SharedObject>>,
    by_checksum: Option<HashMap<Checksum, SharedObject>>,
}

impl ObjectCell {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(CellState::default()),
            children: OnceLock::new(),
        }
    }

    /// Idempotent publish. The first writer for a given kind wins; later
    /// writers observe and reuse the stored object.
    ///
    /// Re-adding the same kind with a different checksum violates the cache
    /// contract (the checksum for a `(key, kind)` pair is stable for the
    /// cell's lifetime) and trips a debug assertion.
    pub fn add(&self, object: SharedObject) -> SharedObject {
        let mut state = self.state.write().expect("cell lock poisoned");

        let Some(primary) = state.primary.clone() else {
            // Indices only exist once a second kind arrived, which requires
            // a primary; an empty cell has neither.
            state.primary = Some(object.clone());
            return object;
        };

        if primary.kind() == object.kind() {
            debug_assert_eq!(
                primary.checksum(),
                object.checksum(),
                "checksum changed for cached kind {}",
                object.kind()
            );
            return primary;
        }

        // Second distinct kind: promote to the dual-index representation,
        // seeding both indices with the primary.
        if state.by_kind.is_none() {
            let mut by_kind = HashMap::new();
            by_kind.insert(primary.kind(), primary.clone());
            let mut by_checksum = HashMap::new();
            by_checksum.insert(primary.checksum(), primary.clone());
            state.by_kind = Some(by_kind);
            state.by_checksum = Some(by_checksum);
        }

        let CellState {
            by_kind,
            by_checksum,
            ..
        } = &mut *state;
        let by_kind = by_kind.as_mut().expect("promoted above");
        let by_checksum = by_checksum.as_mut().expect("indices promoted together");

        if let Some(existing) = by_kind.get(&object.kind()) {
            debug_assert_eq!(
                existing.checksum(),
                object.checksum(),
                "checksum changed for cached kind {}",
                object.kind()
            );
            return existing.clone();
        }
        by_kind.insert(object.kind(), object.clone());
        by_checksum.insert(object.checksum(), object.clone());
        object
    }

    /// Object of the given kind, if this cell holds one.
    pub fn get_by_kind(&self, kind: Kind) -> Option<SharedObject> {
        let state = self.state.read().expect("cell lock poisoned");
        if let Some(primary) = &state.primary {
            if primary.kind() == kind {
                return Some(primary.clone());
            }
        }
        state.by_kind.as_ref().and_then(|map| map.get(&kind).cloned())
    }

    /// Object with the given checksum, if this cell holds one.
    pub fn get_by_checksum(&self, checksum: Checksum) -> Option<SharedObject> {
        let state = self.state.read().expect("cell lock poisoned");
        if let Some(primary) = &state.primary {
            if primary.checksum() == checksum {
                return Some(primary.clone());
            }
        }
        state
            .by_checksum
            .as_ref()
            .and_then(|map| map.get(&checksum).cloned())
    }

    /// The nested child storage, if one was ever created.
    pub fn child_storage(&self) -> Option<Arc<SnapshotStorage>> {
        self.children.get().cloned()
    }

    /// The nested child storage, creating it if this is the first request.
    ///
    /// Initialize-once: under contention exactly one instance survives and
    /// every caller observes it.
    pub fn child_storage_or_create(
        &self,
        make: impl FnOnce() -> SnapshotStorage,
    ) -> Arc<SnapshotStorage> {
        self.children.get_or_init(|| Arc::new(make())).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapsync_types::{kinds, ChecksumObject};
    use std::thread;

    struct Fixed {
        checksum: Checksum,
        kind: Kind,
    }

    impl ChecksumObject for Fixed {
        fn checksum(&self) -> Checksum {
            self.checksum
        }

        fn kind(&self) -> Kind {
            self.kind
        }
    }

    fn object(kind: Kind, content: &[u8]) -> SharedObject {
        Arc::new(Fixed {
            checksum: Checksum::compute(content),
            kind,
        })
    }

    #[test]
    fn first_add_stores_primary() {
        let cell = ObjectCell::new();
        let text = object(kinds::TEXT, b"hello");
        let stored = cell.add(text.clone());
        assert!(Arc::ptr_eq(&stored, &text));
        assert!(cell.get_by_kind(kinds::TEXT).is_some());
        assert!(cell.get_by_checksum(text.checksum()).is_some());
    }

    #[test]
    fn same_kind_readd_returns_first_writer() {
        let cell = ObjectCell::new();
        let first = object(kinds::TEXT, b"hello");
        let second = object(kinds::TEXT, b"hello");
        cell.add(first.clone());
        let stored = cell.add(second);
        assert!(Arc::ptr_eq(&stored, &first));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "checksum changed for cached kind")]
    fn same_kind_different_checksum_trips_assertion() {
        let cell = ObjectCell::new();
        cell.add(object(kinds::TEXT, b"one"));
        cell.add(object(kinds::TEXT, b"two"));
    }

    #[test]
    fn second_kind_promotes_to_indices() {
        let cell = ObjectCell::new();
        let text = object(kinds::TEXT, b"body");
        let options = object(kinds::COMPILE_OPTIONS, b"opts");
        cell.add(text.clone());
        cell.add(options.clone());

        // Both kinds reachable, including the pre-promotion primary.
        let got_text = cell.get_by_kind(kinds::TEXT).unwrap();
        let got_options = cell.get_by_kind(kinds::COMPILE_OPTIONS).unwrap();
        assert!(Arc::ptr_eq(&got_text, &text));
        assert!(Arc::ptr_eq(&got_options, &options));
        assert!(cell.get_by_checksum(text.checksum()).is_some());
        assert!(cell.get_by_checksum(options.checksum()).is_some());
    }

    #[test]
    fn miss_returns_none() {
        let cell = ObjectCell::new();
        cell.add(object(kinds::TEXT, b"x"));
        assert!(cell.get_by_kind(kinds::PROJECT).is_none());
        assert!(cell.get_by_checksum(Checksum::compute(b"absent")).is_none());
    }

    #[test]
    fn concurrent_adds_one_winner_per_kind() {
        let cell = Arc::new(ObjectCell::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let cell = cell.clone();
            handles.push(thread::spawn(move || {
                let kind = if i % 2 == 0 { kinds::TEXT } else { kinds::PROJECT };
                let content: &[u8] = if i % 2 == 0 { b"text" } else { b"project" };
                cell.add(object(kind, content))
            }));
        }
        let stored: Vec<SharedObject> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let text_winner = cell.get_by_kind(kinds::TEXT).unwrap();
        let project_winner = cell.get_by_kind(kinds::PROJECT).unwrap();
        for object in stored {
            let winner = if object.kind() == kinds::TEXT {
                &text_winner
            } else {
                &project_winner
            };
            assert!(Arc::ptr_eq(&object, winner));
        }
    }
}
