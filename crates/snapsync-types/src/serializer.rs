use crate::checksum::Checksum;
use crate::kind::Kind;

/// Content-to-checksum translator shared by every snapshot storage.
///
/// The cache itself never invokes the serializer; it threads one through to
/// the builder collaborators so that object constructors derive checksums
/// consistently across every snapshot in a process. Implementations must be
/// deterministic: the same `(kind, data)` pair always yields the same
/// checksum.
pub trait Serializer: Send + Sync {
    /// Checksum of `data` interpreted as content of `kind`.
    fn checksum(&self, kind: Kind, data: &[u8]) -> Checksum;
}

/// Default serializer: domain-separated BLAKE3.
///
/// The kind tag is prepended to every hash computation so a document text
/// and an options bag with identical bytes never collide.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentSerializer;

impl Serializer for ContentSerializer {
    fn checksum(&self, kind: Kind, data: &[u8]) -> Checksum {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Checksum::from_digest(hasher.finalize().as_bytes())
            .expect("BLAKE3 digest is wider than a checksum")
    }
}
