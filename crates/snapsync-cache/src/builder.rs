use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use snapsync_types::{Kind, Serializer, SharedObject};

use crate::error::CacheResult;
use crate::key::Key;
use crate::storage::SnapshotStorage;

/// Backing state of a pinned snapshot.
///
/// The cache consumes the source in exactly two ways: as an identity it
/// threads through to constructor callbacks, and through `build_tree`, which
/// must deterministically replay construction of the snapshot's full object
/// tree. Determinism is what makes aggressive eviction safe: any checksum
/// produced during a replay is produced again by the next replay.
pub trait SnapshotSource: Send + Sync {
    /// Replay construction of the full object tree into the given builders.
    ///
    /// Called with rebuild-mode builders when the registry recovers from
    /// eviction, and with ordinary builders on first population.
    fn build_tree(
        &self,
        snapshots: &SnapshotBuilder<'_>,
        assets: &AssetBuilder<'_>,
    ) -> CacheResult<()>;
}

/// Builder for hierarchical objects, scoped to one storage level.
///
/// Each hierarchical constructor receives a fresh pair of builders scoped to
/// its key's nested child storage, so a tree populates itself level by
/// level. The rebuild flag propagates down the tree: in rebuild mode every
/// level forces reconstruction instead of consulting the lookup tiers.
pub struct SnapshotBuilder<'a> {
    storage: &'a SnapshotStorage,
    rebuild: bool,
    cancel: &'a CancellationToken,
}

impl<'a> SnapshotBuilder<'a> {
    pub(crate) fn new(
        storage: &'a SnapshotStorage,
        rebuild: bool,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            storage,
            rebuild,
            cancel,
        }
    }

    /// Get or create the hierarchical object for `(key, kind)` at this
    /// level. See [`SnapshotStorage::get_or_create_hierarchy`].
    pub fn hierarchy<V, F>(
        &self,
        key: Key,
        value: &V,
        kind: Kind,
        build: F,
    ) -> CacheResult<SharedObject>
    where
        V: ?Sized,
        F: FnOnce(&SnapshotBuilder<'_>, &AssetBuilder<'_>, &V, Kind) -> CacheResult<SharedObject>,
    {
        self.storage
            .get_or_create_hierarchy(key, value, kind, self.rebuild, self.cancel, build)
    }

    /// Whether this builder is replaying a forced rebuild.
    pub fn is_rebuild(&self) -> bool {
        self.rebuild
    }

    /// The shared content-to-checksum translator.
    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        self.storage.serializer()
    }
}

/// Builder for leaf assets, scoped to one storage level.
pub struct AssetBuilder<'a> {
    storage: &'a SnapshotStorage,
    cancel: &'a CancellationToken,
}

impl<'a> AssetBuilder<'a> {
    pub(crate) fn new(storage: &'a SnapshotStorage, cancel: &'a CancellationToken) -> Self {
        Self { storage, cancel }
    }

    /// Get or create the asset for `(key, kind)` at this level. See
    /// [`SnapshotStorage::get_or_create_asset`].
    pub fn asset<V, F>(&self, key: Key, value: &V, kind: Kind, build: F) -> CacheResult<SharedObject>
    where
        V: ?Sized,
        F: FnOnce(&V, Kind) -> CacheResult<SharedObject>,
    {
        self.storage
            .get_or_create_asset(key, value, kind, self.cancel, build)
    }

    /// The shared content-to-checksum translator.
    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        self.storage.serializer()
    }
}
