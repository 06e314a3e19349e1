//! # Segment — append-only storage unit
//!
//! A segment is one file on disk plus an in-memory hash index mapping each
//! key to the byte offset of that key's **latest** record within the file.
//! Segments are the only persistent structure in CinderKV: the database is
//! an ordered list of them, and a key's authoritative value lives in the
//! newest segment that contains it.
//!
//! ## Lifecycle
//!
//! ```text
//! create() ──► Active ── seal() ──► Sealed ── (merge retires file) ──► gone
//!                ▲
//! recover() ── activate()   (tail segment only, after replay)
//! ```
//!
//! An **Active** segment holds an open append handle; exactly one exists per
//! database. A **Sealed** segment has no handle: reads open the file fresh
//! per call, so concurrent readers never share a file position with the
//! appender or with each other.
//!
//! The index of a sealed segment is immutable; the active segment's index is
//! only ever mutated by the database's single writer, and an entry is
//! published only after the record's bytes have been handed to the OS, so a
//! reader that observes an offset can always read the bytes behind it.

mod iter;
mod paths;

pub use iter::SegmentIter;
pub use paths::{
    list_segment_ids, parse_segment_id, segment_file_name, segment_path, SEGMENT_PREFIX,
};

use parking_lot::{Mutex, RwLock};
use record::{read_value, Record, RecordError, Value};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors that can occur on a single segment.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// A write was attempted on a segment whose append handle is gone.
    #[error("segment is sealed")]
    Sealed,

    /// A record failed to decode or a read came up short.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// One append-only segment file and its key → offset index.
pub struct Segment {
    id: u64,
    path: PathBuf,
    /// Logical size: the offset at which the next record will start.
    offset: AtomicU64,
    /// Latest record offset per key. RwLock because readers probe the active
    /// segment's index while the writer appends to it.
    index: RwLock<HashMap<String, u64>>,
    /// Append handle; `Some` while the segment is active.
    appender: Mutex<Option<File>>,
}

impl Segment {
    /// Creates a new, empty, active segment file `segment-<id>` under `dir`.
    pub fn create(dir: &Path, id: u64) -> Result<Segment, SegmentError> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Segment {
            id,
            path,
            offset: AtomicU64::new(0),
            index: RwLock::new(HashMap::new()),
            appender: Mutex::new(Some(file)),
        })
    }

    /// Rebuilds a segment from an existing file by replaying its records.
    ///
    /// Each decoded record indexes its pre-read offset, then the offset
    /// advances by the record's encoded size. A truncated trailing record
    /// stops the replay cleanly; a structurally corrupt record fails it.
    /// The result is sealed; call [`activate`](Segment::activate) on the
    /// segment that should accept appends.
    pub fn recover(dir: &Path, id: u64) -> Result<Segment, SegmentError> {
        let path = segment_path(dir, id);
        let mut index = HashMap::new();
        let mut offset = 0u64;

        for item in SegmentIter::open(&path)? {
            let rec = item?;
            let len = rec.encoded_len();
            index.insert(rec.key, offset);
            offset += len;
        }

        Ok(Segment {
            id,
            path,
            offset: AtomicU64::new(offset),
            index: RwLock::new(index),
            appender: Mutex::new(None),
        })
    }

    /// Reopens the append handle after [`recover`](Segment::recover).
    ///
    /// If the file holds garbage past the recovered logical offset (the
    /// partial tail of an interrupted append), it is truncated away first so
    /// that appended records stay decodable by a later replay. Returns the
    /// number of bytes dropped.
    pub fn activate(&self) -> Result<u64, SegmentError> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let logical = self.offset.load(Ordering::Relaxed);
        let on_disk = file.metadata()?.len();
        if on_disk > logical {
            file.set_len(logical)?;
        }
        *self.appender.lock() = Some(file);
        Ok(on_disk.saturating_sub(logical))
    }

    /// Appends a record and indexes its start offset.
    ///
    /// On a write failure neither the offset nor the index is touched, so
    /// the segment's observable state still describes only durable records.
    pub fn write(&self, record: &Record) -> Result<(), SegmentError> {
        let mut guard = self.appender.lock();
        let file = guard.as_mut().ok_or(SegmentError::Sealed)?;

        let buf = record.encode();
        file.write_all(&buf)?;

        let start = self.offset.load(Ordering::Relaxed);
        self.offset
            .store(start + buf.len() as u64, Ordering::Relaxed);
        self.index.write().insert(record.key.clone(), start);
        Ok(())
    }

    /// Point lookup: returns the newest value this segment holds for `key`,
    /// or `None` if the key never hit this segment.
    ///
    /// Opens a fresh read handle per call; readers therefore never contend
    /// on a file position with the appender or with each other.
    pub fn get(&self, key: &str) -> Result<Option<Value>, SegmentError> {
        let offset = match self.index.read().get(key) {
            Some(&o) => o,
            None => return Ok(None),
        };

        let mut rdr = BufReader::new(File::open(&self.path)?);
        rdr.seek(SeekFrom::Start(offset))?;
        Ok(Some(read_value(&mut rdr)?))
    }

    /// Returns `true` if the key appears in this segment's index.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.index.read().contains_key(key)
    }

    /// Returns `true` iff the logical size has grown past `threshold` bytes.
    #[must_use]
    pub fn is_surpassed(&self, threshold: u64) -> bool {
        self.size() > threshold
    }

    /// The logical size in bytes (start offset of the next append).
    #[must_use]
    pub fn size(&self) -> u64 {
        self.offset.load(Ordering::Relaxed)
    }

    /// The segment id embedded in the filename.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct keys indexed in this segment.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.index.read().len()
    }

    /// Whether this segment currently accepts appends.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.appender.lock().is_some()
    }

    /// Closes the append handle; the segment becomes read-only.
    ///
    /// Idempotent; sealing a sealed segment is a no-op.
    pub fn seal(&self) {
        self.appender.lock().take();
    }

    /// A lazy iterator over the records stored in this segment, in file
    /// order, reading from a fresh descriptor.
    pub fn iter(&self) -> Result<SegmentIter, SegmentError> {
        Ok(SegmentIter::open(&self.path)?)
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("size", &self.size())
            .field("keys", &self.key_count())
            .field("active", &self.is_active())
            .finish()
    }
}
