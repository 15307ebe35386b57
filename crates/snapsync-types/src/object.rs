use std::fmt;
use std::sync::Arc;

use crate::checksum::Checksum;
use crate::kind::Kind;

/// Contract for anything the snapshot cache can hold.
///
/// The cache never interprets an object's content; it only reads its content
/// identity and its kind. Implementations must satisfy:
/// - `checksum()` is stable for the lifetime of the object and derived from
///   its content, so equal content yields equal checksums.
/// - `kind()` is stable and distinguishes semantically different objects
///   that may share a cache key.
/// - Objects are immutable once published; concurrent reads are always safe.
pub trait ChecksumObject: Send + Sync {
    /// Content identity of this object.
    fn checksum(&self) -> Checksum;

    /// Discriminator distinguishing this object from others under the same
    /// cache key.
    fn kind(&self) -> Kind;
}

impl fmt::Debug for dyn ChecksumObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChecksumObject")
            .field("checksum", &self.checksum())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Shared handle to a cached object.
///
/// Objects are shared by reference between snapshots: two snapshots holding
/// the same content hold the same allocation, which is what makes
/// cross-snapshot deduplication observable (`Arc::ptr_eq`).
pub type SharedObject = Arc<dyn ChecksumObject>;
