use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use snapsync_types::{Checksum, Kind, Serializer, SharedObject};

use crate::builder::{AssetBuilder, SnapshotBuilder, SnapshotSource};
use crate::cell::ObjectCell;
use crate::error::{CacheError, CacheResult};
use crate::key::Key;
use crate::registry::SnapshotRegistry;

/// Per-snapshot cache authority.
///
/// One storage exists for every pinned snapshot (and, nested, for every
/// hierarchical object's children). It owns a key-to-cell map and resolves
/// misses in three tiers: its own tree, every sibling storage in the
/// registry, and finally the caller-supplied constructor.
///
/// The cell map iterates in insertion order, so scan order is deterministic
/// within a process run.
pub struct SnapshotStorage {
    snapshot: Arc<dyn SnapshotSource>,
    serializer: Arc<dyn Serializer>,
    registry: Weak<SnapshotRegistry>,
    cells: RwLock<IndexMap<Key, Arc<ObjectCell>>>,
}

impl SnapshotStorage {
    pub(crate) fn new(
        snapshot: Arc<dyn SnapshotSource>,
        serializer: Arc<dyn Serializer>,
        registry: Weak<SnapshotRegistry>,
    ) -> Self {
        Self {
            snapshot,
            serializer,
            registry,
            cells: RwLock::new(IndexMap::new()),
        }
    }

    /// The shared content-to-checksum translator.
    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    /// The opaque backing snapshot.
    pub fn snapshot(&self) -> &Arc<dyn SnapshotSource> {
        &self.snapshot
    }

    fn cell_of(&self, key: &Key) -> Option<Arc<ObjectCell>> {
        self.cells
            .read()
            .expect("cells lock poisoned")
            .get(key)
            .cloned()
    }

    fn cell_for(&self, key: Key) -> Arc<ObjectCell> {
        self.cells
            .write()
            .expect("cells lock poisoned")
            .entry(key)
            .or_insert_with(|| Arc::new(ObjectCell::new()))
            .clone()
    }

    // Cells in insertion order, detached from the lock so recursion into
    // child storages never holds this storage's guard.
    fn cells_snapshot(&self) -> Vec<Arc<ObjectCell>> {
        self.cells
            .read()
            .expect("cells lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub(crate) fn publish(&self, key: Key, object: SharedObject) -> SharedObject {
        self.cell_for(key).add(object)
    }

    /// Search this storage's full tree for an object with the given
    /// checksum: per cell, a direct probe first, then its child storage.
    pub fn find_by_checksum(&self, checksum: Checksum) -> Option<SharedObject> {
        for cell in self.cells_snapshot() {
            if let Some(object) = cell.get_by_checksum(checksum) {
                return Some(object);
            }
            if let Some(child) = cell.child_storage() {
                if let Some(object) = child.find_by_checksum(checksum) {
                    return Some(object);
                }
            }
        }
        None
    }

    /// Search this storage's full tree for the entry matching `(key, kind)`:
    /// a direct key probe first, then every cell's child storage. This is
    /// how an object computed for one snapshot is found and reused from
    /// another snapshot's tree without recomputation.
    pub fn find_entry(&self, key: &Key, kind: Kind) -> Option<SharedObject> {
        if let Some(cell) = self.cell_of(key) {
            if let Some(object) = cell.get_by_kind(kind) {
                return Some(object);
            }
        }
        for cell in self.cells_snapshot() {
            if let Some(child) = cell.child_storage() {
                if let Some(object) = child.find_entry(key, kind) {
                    return Some(object);
                }
            }
        }
        None
    }

    /// Get or create the leaf asset for `(key, kind)`.
    ///
    /// Three-tier lookup: this storage's tree, then every registered
    /// storage, then the `build` callback. Hits from other tiers are
    /// republished into this storage's own cell so future lookups stay
    /// local. The returned object is the cell's first-writer winner.
    pub fn get_or_create_asset<V, F>(
        &self,
        key: Key,
        value: &V,
        kind: Kind,
        cancel: &CancellationToken,
        build: F,
    ) -> CacheResult<SharedObject>
    where
        V: ?Sized,
        F: FnOnce(&V, Kind) -> CacheResult<SharedObject>,
    {
        if cancel.is_cancelled() {
            return Err(CacheError::Canceled);
        }
        if let Some(existing) = self.find_entry(&key, kind) {
            return Ok(self.publish(key, existing));
        }
        if let Some(registry) = self.registry.upgrade() {
            if let Some(existing) = registry.find_entry_anywhere(&key, kind) {
                return Ok(self.publish(key, existing));
            }
        } else {
            debug!(%kind, "registry dropped; skipping cross-snapshot lookup");
        }
        if cancel.is_cancelled() {
            return Err(CacheError::Canceled);
        }
        let object = build(value, kind)?;
        Ok(self.publish(key, object))
    }

    /// Get or create the hierarchical object for `(key, kind)`.
    ///
    /// Same tiers as [`get_or_create_asset`](Self::get_or_create_asset),
    /// except that `rebuild` skips the lookup tiers and forces construction
    /// (used when the registry is regenerating an evicted tree). The `build`
    /// callback receives builders scoped to the key's nested child storage
    /// so the object can populate its own children.
    pub fn get_or_create_hierarchy<V, F>(
        &self,
        key: Key,
        value: &V,
        kind: Kind,
        rebuild: bool,
        cancel: &CancellationToken,
        build: F,
    ) -> CacheResult<SharedObject>
    where
        V: ?Sized,
        F: FnOnce(&SnapshotBuilder<'_>, &AssetBuilder<'_>, &V, Kind) -> CacheResult<SharedObject>,
    {
        if cancel.is_cancelled() {
            return Err(CacheError::Canceled);
        }
        if !rebuild {
            if let Some(existing) = self.find_entry(&key, kind) {
                return Ok(self.publish(key, existing));
            }
            if let Some(registry) = self.registry.upgrade() {
                if let Some(existing) = registry.find_entry_anywhere(&key, kind) {
                    return Ok(self.publish(key, existing));
                }
            } else {
                debug!(%kind, "registry dropped; skipping cross-snapshot lookup");
            }
        }
        if cancel.is_cancelled() {
            return Err(CacheError::Canceled);
        }

        let cell = self.cell_for(key);
        let child = cell.child_storage_or_create(|| self.new_child());
        let snapshots = SnapshotBuilder::new(&child, rebuild, cancel);
        let assets = AssetBuilder::new(&child, cancel);
        let object = build(&snapshots, &assets, value, kind)?;
        Ok(cell.add(object))
    }

    /// Build this storage's tree from its snapshot with the lookup tiers
    /// active (inbound population path).
    pub fn populate(&self, cancel: &CancellationToken) -> CacheResult<()> {
        self.replay(false, cancel)
    }

    /// Regenerate this storage's full tree from its snapshot, forcing
    /// construction at every level. Republication goes through the same
    /// idempotent cell publish, so concurrent readers never observe a torn
    /// tree.
    pub fn rebuild_tree(&self, cancel: &CancellationToken) -> CacheResult<()> {
        debug!("rebuilding snapshot storage tree");
        self.replay(true, cancel)
    }

    fn replay(&self, rebuild: bool, cancel: &CancellationToken) -> CacheResult<()> {
        if cancel.is_cancelled() {
            return Err(CacheError::Canceled);
        }
        let snapshots = SnapshotBuilder::new(self, rebuild, cancel);
        let assets = AssetBuilder::new(self, cancel);
        self.snapshot.build_tree(&snapshots, &assets)
    }

    fn new_child(&self) -> SnapshotStorage {
        SnapshotStorage::new(
            self.snapshot.clone(),
            self.serializer.clone(),
            self.registry.clone(),
        )
    }

    /// Drop every cell (and transitively every child storage).
    ///
    /// Deterministic test setup only; production code relies on the rebuild
    /// path instead of ever clearing a live cache.
    pub fn clear_for_tests(&self) {
        self.cells.write().expect("cells lock poisoned").clear();
    }
}
