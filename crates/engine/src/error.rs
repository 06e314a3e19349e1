//! Error types for the CinderKV engine.
//!
//! `NotFound` and `WrongType` are normal signals a caller is expected to
//! match on; they never invalidate the database. `RecordTooLarge` and
//! `EmptyKey` are caller errors rejected before anything touches disk.
//! `Corrupt` and `Io` follow the propagation rules of the read, write, and
//! merge paths: read failures change no state, append failures leave the
//! segment's index and offset untouched, and merge failures keep the
//! pre-merge layout serving.

use record::RecordError;
use segment::SegmentError;
use thiserror::Error;

/// Result type alias using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for engine operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No segment contains the requested key.
    #[error("key not found")]
    NotFound,

    /// The key exists but its stored type tag does not match the typed
    /// accessor used. No coercion is performed.
    #[error("stored value type does not match the requested type")]
    WrongType,

    /// The encoded record would not fit in a single segment.
    #[error("record of {size} bytes exceeds the segment limit of {limit} bytes")]
    RecordTooLarge { size: u64, limit: u64 },

    /// Keys are non-empty UTF-8 strings.
    #[error("key must not be empty")]
    EmptyKey,

    /// Put invoked after Close.
    #[error("database is closed")]
    Closed,

    /// A record with an impossible declared size or a short read mid-record.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Invalid open parameters.
    #[error("configuration error: {0}")]
    Config(String),

    /// An underlying filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RecordError> for StoreError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Corrupt(msg) => StoreError::Corrupt(msg),
            RecordError::Io(e) => StoreError::Io(e),
        }
    }
}

impl From<SegmentError> for StoreError {
    fn from(e: SegmentError) -> Self {
        match e {
            // The single writer only ever appends to the active segment;
            // a sealed append means the engine is shutting down.
            SegmentError::Sealed => StoreError::Closed,
            SegmentError::Record(re) => re.into(),
            SegmentError::Io(e) => StoreError::Io(e),
        }
    }
}
