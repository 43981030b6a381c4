//! Error and Result types for the storage core.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for storage-core operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The error type for codec, chunk and cursor operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An encoder ran out of buffer space.
    ///
    /// This is expected control flow: the caller seals the current chunk
    /// and starts a new one. No data is lost and no partial field is left
    /// in the buffer.
    #[error("Buffer full")]
    BufferFull,

    /// A decoder hit a byte pattern with no matching case, or the stream
    /// ended mid-field. Signals upstream data corruption; must not be
    /// retried at the same position.
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    /// A sealed chunk failed payload verification.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Expected CRC32 checksum stored in the chunk header.
        expected: u32,
        /// Actual CRC32 checksum computed over the payload.
        actual: u32,
    },

    /// The cursor planner was invoked with zero cursors.
    #[error("Cannot plan an empty cursor list")]
    EmptyPlan,

    /// Unknown chunk kind byte in a chunk header.
    #[error("Unsupported chunk kind: {0}")]
    UnsupportedKind(u8),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
