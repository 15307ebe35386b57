use thiserror::Error;

/// Errors produced by checksum construction and wire decoding.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// The supplied payload has the wrong length for a checksum.
    #[error("invalid checksum length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// I/O failure while reading or writing a serialized checksum.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for checksum operations.
pub type ChecksumResult<T> = Result<T, ChecksumError>;
