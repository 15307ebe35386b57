use snapsync_types::Checksum;

use crate::key::SnapshotId;

/// Errors from snapshot cache operations.
///
/// Everything except `Canceled` and `Construction` indicates a caller bug
/// (a violated registration or pinning contract), not a transient condition;
/// none of these are retried internally.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A snapshot id was registered while already registered.
    #[error("snapshot {0} is already registered")]
    SnapshotAlreadyRegistered(SnapshotId),

    /// A snapshot id was unregistered without being registered.
    #[error("snapshot {0} is not registered")]
    SnapshotNotRegistered(SnapshotId),

    /// A checksum could not be resolved even after rebuilding every pinned
    /// snapshot's tree. The pinning discipline was violated: the content is
    /// not reachable from any registered snapshot.
    #[error("checksum {0} is not reachable from any pinned snapshot")]
    UnresolvableChecksum(Checksum),

    /// The operation observed a cancellation signal before publishing.
    #[error("operation canceled")]
    Canceled,

    /// A caller-supplied object constructor failed.
    #[error("object construction failed: {0}")]
    Construction(String),
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
