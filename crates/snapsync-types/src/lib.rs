//! Foundation types for snapsync.
//!
//! snapsync keeps a host process and an out-of-process worker agreed on
//! workspace state by exchanging fixed-size content checksums instead of full
//! payloads. This crate provides the types every other snapsync crate builds
//! on.
//!
//! # Key Types
//!
//! - [`Checksum`] — 20-byte content-derived identifier with two wire forms
//! - [`Kind`] — static discriminator for cached objects sharing a key
//! - [`ChecksumObject`] — contract for anything the cache can hold
//! - [`Serializer`] — content-to-checksum collaborator, with the
//!   domain-separated BLAKE3 default [`ContentSerializer`]

pub mod checksum;
pub mod error;
pub mod kind;
pub mod object;
pub mod serializer;

pub use checksum::{Checksum, CHECKSUM_SIZE};
pub use error::{ChecksumError, ChecksumResult};
pub use kind::{kinds, Kind};
pub use object::{ChecksumObject, SharedObject};
pub use serializer::{ContentSerializer, Serializer};
