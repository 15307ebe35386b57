use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use snapsync_types::{Checksum, Kind, Serializer, SharedObject};

use crate::builder::SnapshotSource;
use crate::error::{CacheError, CacheResult};
use crate::key::{Key, SnapshotId};
use crate::storage::SnapshotStorage;

/// Registry of every live (pinned) snapshot storage.
///
/// The registry is the resolution authority for the process: given a bare
/// checksum received from a remote peer, it finds the object in some pinned
/// snapshot's tree, rebuilding evicted trees if it must. Its central
/// invariant: while a snapshot is registered, every checksum its tree ever
/// produced stays resolvable — live from cache or by deterministic rebuild.
/// That is what lets storages evict aggressively with no LRU bookkeeping.
pub struct SnapshotRegistry {
    serializer: Arc<dyn Serializer>,
    storages: RwLock<IndexMap<SnapshotId, Arc<SnapshotStorage>>>,
}

impl SnapshotRegistry {
    /// Create a registry around the shared serializer handed to every
    /// storage it creates.
    pub fn new(serializer: Arc<dyn Serializer>) -> Arc<Self> {
        Arc::new(Self {
            serializer,
            storages: RwLock::new(IndexMap::new()),
        })
    }

    /// Create a storage for a snapshot. Factory only: the storage is not
    /// registered until [`register`](Self::register) is called.
    pub fn create_storage(self: &Arc<Self>, snapshot: Arc<dyn SnapshotSource>) -> Arc<SnapshotStorage> {
        Arc::new(SnapshotStorage::new(
            snapshot,
            self.serializer.clone(),
            Arc::downgrade(self),
        ))
    }

    /// Pin a snapshot: its storage joins checksum resolution until
    /// unregistered. Registering an id twice is a caller bug.
    pub fn register(&self, id: SnapshotId, storage: Arc<SnapshotStorage>) -> CacheResult<()> {
        let mut storages = self.storages.write().expect("registry lock poisoned");
        if storages.contains_key(&id) {
            return Err(CacheError::SnapshotAlreadyRegistered(id));
        }
        storages.insert(id, storage);
        info!(%id, "registered snapshot");
        Ok(())
    }

    /// Unpin a snapshot. Unregistering an unknown id is a caller bug.
    pub fn unregister(&self, id: SnapshotId) -> CacheResult<()> {
        let mut storages = self.storages.write().expect("registry lock poisoned");
        if storages.shift_remove(&id).is_none() {
            return Err(CacheError::SnapshotNotRegistered(id));
        }
        info!(%id, "unregistered snapshot");
        Ok(())
    }

    /// Whether the given snapshot id is currently registered.
    pub fn is_registered(&self, id: SnapshotId) -> bool {
        self.storages
            .read()
            .expect("registry lock poisoned")
            .contains_key(&id)
    }

    /// Number of currently registered snapshots.
    pub fn registered_count(&self) -> usize {
        self.storages.read().expect("registry lock poisoned").len()
    }

    /// Resolve a checksum to its object.
    ///
    /// Scans every registered storage's tree; on a total miss, forces each
    /// storage to rebuild its full tree from its snapshot and re-probes
    /// after each rebuild. A miss after that is an invariant violation: the
    /// checksum belongs to content no pinned snapshot reaches. Never
    /// reports "not found" short of that.
    pub fn resolve(
        &self,
        checksum: Checksum,
        cancel: &CancellationToken,
    ) -> CacheResult<SharedObject> {
        let storages = self.storages_snapshot();
        for storage in &storages {
            if let Some(object) = storage.find_by_checksum(checksum) {
                return Ok(object);
            }
        }

        // The object was evicted everywhere. Its snapshot must still be
        // pinned, so replaying each snapshot's tree regenerates it.
        debug!(%checksum, "checksum missed all live caches; rebuilding pinned snapshots");
        for storage in &storages {
            if cancel.is_cancelled() {
                return Err(CacheError::Canceled);
            }
            storage.rebuild_tree(cancel)?;
            if let Some(object) = storage.find_by_checksum(checksum) {
                return Ok(object);
            }
        }

        warn!(%checksum, "checksum unreachable from any pinned snapshot");
        Err(CacheError::UnresolvableChecksum(checksum))
    }

    /// Cross-storage entry lookup: the middle tier of every storage's
    /// get-or-create, so identical content shared between overlapping
    /// snapshots is computed once.
    pub(crate) fn find_entry_anywhere(&self, key: &Key, kind: Kind) -> Option<SharedObject> {
        for storage in self.storages_snapshot() {
            if let Some(object) = storage.find_entry(key, kind) {
                return Some(object);
            }
        }
        None
    }

    fn storages_snapshot(&self) -> Vec<Arc<SnapshotStorage>> {
        self.storages
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}
