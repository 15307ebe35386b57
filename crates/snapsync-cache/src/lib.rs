//! Checksum-addressed snapshot cache.
//!
//! A host process pins immutable snapshots of workspace state; a remote
//! worker refers to any piece of that state by its [`Checksum`] alone. This
//! crate resolves those checksums: every pinned snapshot owns a
//! [`SnapshotStorage`] of cached objects, and the [`SnapshotRegistry`] fans
//! lookups out across all of them, replaying a snapshot's tree from scratch
//! when the object was evicted.
//!
//! # Resolution tiers
//!
//! An inbound `(key, kind)` request is satisfied from, in order: the asking
//! storage's own tree, any sibling storage in the registry (so overlapping
//! snapshots share one construction), and finally the caller's constructor.
//! An inbound checksum request is satisfied from any live tree, then by
//! rebuilding every pinned tree; a miss after that is a pinning-contract
//! violation, not a "not found".
//!
//! # Key Types
//!
//! - [`SnapshotRegistry`] — registry of pinned snapshots, checksum resolver
//! - [`SnapshotStorage`] — per-snapshot cache authority
//! - [`ObjectCell`] — per-key cell: primary slot, lazy indices, child storage
//! - [`SnapshotSource`] — the opaque backing snapshot and its rebuild replay
//! - [`SnapshotBuilder`] / [`AssetBuilder`] — scoped construction seams
//! - [`Key`] — reference-identity cache key; [`SnapshotId`] — pin identity
//!
//! [`Checksum`]: snapsync_types::Checksum

pub mod builder;
pub mod cell;
pub mod error;
pub mod key;
pub mod registry;
pub mod storage;

pub use builder::{AssetBuilder, SnapshotBuilder, SnapshotSource};
pub use cell::ObjectCell;
pub use error::{CacheError, CacheResult};
pub use key::{Key, SnapshotId};
pub use registry::SnapshotRegistry;
pub use storage::SnapshotStorage;
