use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{ChecksumError, ChecksumResult};

/// Width of a checksum payload in bytes.
pub const CHECKSUM_SIZE: usize = 20;

/// Fixed-size content-derived identifier.
///
/// A `Checksum` names a piece of content: identical content always produces
/// the same checksum, so remote peers can exchange checksums instead of full
/// payloads to decide what needs transferring. Equality is structural over
/// the 20-byte payload. Checksums are deduplication tokens, not a
/// cryptographic security boundary.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checksum([u8; CHECKSUM_SIZE]);

impl Checksum {
    /// The null checksum (all zeros). Represents "no content".
    pub const NULL: Self = Self([0u8; CHECKSUM_SIZE]);

    /// Build a checksum from an exact-width payload.
    ///
    /// Empty input canonicalizes to [`Checksum::NULL`]. Any other length
    /// besides [`CHECKSUM_SIZE`] is rejected.
    pub fn from_bytes(payload: &[u8]) -> ChecksumResult<Self> {
        if payload.is_empty() {
            return Ok(Self::NULL);
        }
        if payload.len() != CHECKSUM_SIZE {
            return Err(ChecksumError::InvalidLength {
                expected: CHECKSUM_SIZE,
                actual: payload.len(),
            });
        }
        let mut bytes = [0u8; CHECKSUM_SIZE];
        bytes.copy_from_slice(payload);
        Ok(Self(bytes))
    }

    /// Build a checksum from a digest at least [`CHECKSUM_SIZE`] bytes wide,
    /// truncating the excess.
    ///
    /// Lets callers feed a full 32-byte BLAKE3 digest directly. Empty input
    /// canonicalizes to [`Checksum::NULL`].
    pub fn from_digest(digest: &[u8]) -> ChecksumResult<Self> {
        if digest.is_empty() {
            return Ok(Self::NULL);
        }
        if digest.len() < CHECKSUM_SIZE {
            return Err(ChecksumError::InvalidLength {
                expected: CHECKSUM_SIZE,
                actual: digest.len(),
            });
        }
        let mut bytes = [0u8; CHECKSUM_SIZE];
        bytes.copy_from_slice(&digest[..CHECKSUM_SIZE]);
        Ok(Self(bytes))
    }

    /// Checksum of raw content: BLAKE3, truncated to checksum width.
    ///
    /// Never returns [`Checksum::NULL`] — the digest of empty content is a
    /// real digest, distinct from "no content".
    pub fn compute(content: &[u8]) -> Self {
        let digest = blake3::hash(content);
        let mut bytes = [0u8; CHECKSUM_SIZE];
        bytes.copy_from_slice(&digest.as_bytes()[..CHECKSUM_SIZE]);
        Self(bytes)
    }

    /// Wrap a pre-validated payload.
    pub const fn from_array(bytes: [u8; CHECKSUM_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns `true` if this is the null checksum.
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// The raw payload.
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_SIZE] {
        &self.0
    }

    /// Write the structured wire form: two `u64` words then one `u32` word,
    /// little-endian.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> ChecksumResult<()> {
        let lo = u64::from_le_bytes(self.0[0..8].try_into().expect("fixed slice width"));
        let mid = u64::from_le_bytes(self.0[8..16].try_into().expect("fixed slice width"));
        let hi = u32::from_le_bytes(self.0[16..20].try_into().expect("fixed slice width"));
        writer.write_all(&lo.to_le_bytes())?;
        writer.write_all(&mid.to_le_bytes())?;
        writer.write_all(&hi.to_le_bytes())?;
        Ok(())
    }

    /// Read the structured wire form written by [`Checksum::write_to`].
    pub fn read_from<R: Read>(reader: &mut R) -> ChecksumResult<Self> {
        let mut bytes = [0u8; CHECKSUM_SIZE];
        reader.read_exact(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Write the legacy blob form: `u32` payload length (little-endian)
    /// followed by the raw payload bytes.
    ///
    /// The null checksum is written with length zero, matching peers that
    /// transmit "no content" as an empty blob.
    pub fn write_length_prefixed<W: Write>(&self, writer: &mut W) -> ChecksumResult<()> {
        if self.is_null() {
            writer.write_all(&0u32.to_le_bytes())?;
            return Ok(());
        }
        writer.write_all(&(CHECKSUM_SIZE as u32).to_le_bytes())?;
        writer.write_all(&self.0)?;
        Ok(())
    }

    /// Read the legacy blob form. Accepts length zero (the null checksum) or
    /// exactly [`CHECKSUM_SIZE`]; anything else is a malformed payload.
    pub fn read_length_prefixed<R: Read>(reader: &mut R) -> ChecksumResult<Self> {
        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len == 0 {
            return Ok(Self::NULL);
        }
        if len != CHECKSUM_SIZE {
            return Err(ChecksumError::InvalidLength {
                expected: CHECKSUM_SIZE,
                actual: len,
            });
        }
        let mut bytes = [0u8; CHECKSUM_SIZE];
        reader.read_exact(&mut bytes)?;
        Ok(Self(bytes))
    }

    // The payload is itself a digest, so its prefix is already uniformly
    // distributed. Reusing it as the hash code avoids rehashing 20 bytes on
    // every map probe.
    fn hash_word(&self) -> u64 {
        u64::from_le_bytes(self.0[0..8].try_into().expect("fixed slice width"))
    }
}

impl Hash for Checksum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_word());
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base64::engine::general_purpose::STANDARD.encode(self.0))
    }
}

impl From<[u8; CHECKSUM_SIZE]> for Checksum {
    fn from(bytes: [u8; CHECKSUM_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Checksum> for [u8; CHECKSUM_SIZE] {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;
    use std::io::Cursor;

    fn hash_of(checksum: &Checksum) -> u64 {
        let mut hasher = DefaultHasher::new();
        checksum.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn from_bytes_exact_width() {
        let payload = [7u8; CHECKSUM_SIZE];
        let checksum = Checksum::from_bytes(&payload).unwrap();
        assert_eq!(checksum.as_bytes(), &payload);
    }

    #[test]
    fn from_bytes_rejects_wrong_width() {
        let err = Checksum::from_bytes(&[1u8; 19]).unwrap_err();
        assert!(matches!(
            err,
            ChecksumError::InvalidLength {
                expected: CHECKSUM_SIZE,
                actual: 19
            }
        ));
        assert!(Checksum::from_bytes(&[1u8; 21]).is_err());
    }

    #[test]
    fn empty_input_canonicalizes_to_null() {
        let a = Checksum::from_bytes(&[]).unwrap();
        let b = Checksum::from_bytes(&[]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Checksum::NULL);
        assert!(a.is_null());
        assert_eq!(Checksum::from_digest(&[]).unwrap(), Checksum::NULL);
    }

    #[test]
    fn from_digest_truncates() {
        let digest = [9u8; 32];
        let checksum = Checksum::from_digest(&digest).unwrap();
        assert_eq!(checksum.as_bytes(), &[9u8; CHECKSUM_SIZE]);
    }

    #[test]
    fn from_digest_rejects_short_input() {
        let err = Checksum::from_digest(&[9u8; 12]).unwrap_err();
        assert!(matches!(err, ChecksumError::InvalidLength { actual: 12, .. }));
    }

    #[test]
    fn compute_is_deterministic() {
        assert_eq!(Checksum::compute(b"content"), Checksum::compute(b"content"));
        assert_ne!(Checksum::compute(b"content"), Checksum::compute(b"other"));
    }

    #[test]
    fn compute_of_empty_is_not_null() {
        assert!(!Checksum::compute(b"").is_null());
    }

    #[test]
    fn structured_roundtrip() {
        let checksum = Checksum::compute(b"roundtrip");
        let mut buf = Vec::new();
        checksum.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), CHECKSUM_SIZE);
        let decoded = Checksum::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, checksum);
    }

    #[test]
    fn length_prefixed_roundtrip() {
        let checksum = Checksum::compute(b"blob");
        let mut buf = Vec::new();
        checksum.write_length_prefixed(&mut buf).unwrap();
        assert_eq!(buf.len(), 4 + CHECKSUM_SIZE);
        let decoded = Checksum::read_length_prefixed(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, checksum);
    }

    #[test]
    fn length_prefixed_null_roundtrip() {
        let mut buf = Vec::new();
        Checksum::NULL.write_length_prefixed(&mut buf).unwrap();
        assert_eq!(buf.len(), 4);
        let decoded = Checksum::read_length_prefixed(&mut Cursor::new(buf)).unwrap();
        assert!(decoded.is_null());
    }

    #[test]
    fn length_prefixed_rejects_bad_length() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 7]);
        let err = Checksum::read_length_prefixed(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, ChecksumError::InvalidLength { actual: 7, .. }));
    }

    #[test]
    fn equal_checksums_have_equal_hashes() {
        let a = Checksum::compute(b"same");
        let b = Checksum::compute(b"same");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn display_is_base64_and_stable() {
        let checksum = Checksum::from_array([0u8; CHECKSUM_SIZE]);
        // 20 zero bytes -> 28 base64 characters, one padding byte.
        assert_eq!(checksum.to_string(), "A".repeat(27) + "=");
    }

    proptest! {
        #[test]
        fn structured_roundtrip_any_payload(payload in prop::array::uniform20(any::<u8>())) {
            let checksum = Checksum::from_array(payload);
            let mut buf = Vec::new();
            checksum.write_to(&mut buf).unwrap();
            let decoded = Checksum::read_from(&mut Cursor::new(buf)).unwrap();
            prop_assert_eq!(decoded, checksum);
        }

        #[test]
        fn length_prefixed_roundtrip_any_payload(payload in prop::array::uniform20(any::<u8>())) {
            let checksum = Checksum::from_array(payload);
            let mut buf = Vec::new();
            checksum.write_length_prefixed(&mut buf).unwrap();
            let decoded = Checksum::read_length_prefixed(&mut Cursor::new(buf)).unwrap();
            prop_assert_eq!(decoded, checksum);
        }

        #[test]
        fn distinct_payloads_rarely_collide(a in prop::array::uniform20(any::<u8>()),
                                            b in prop::array::uniform20(any::<u8>())) {
            let ca = Checksum::from_array(a);
            let cb = Checksum::from_array(b);
            prop_assert_eq!(ca == cb, a == b);
        }
    }
}
