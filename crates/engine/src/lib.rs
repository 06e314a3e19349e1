//! # Engine - CinderKV Storage Engine
//!
//! A persistent, embeddable key/value store on a log-structured, append-only
//! segmented file layout with an in-memory hash index and background merge
//! compaction. Keys are UTF-8 strings; values are typed (UTF-8 strings or
//! signed 64-bit integers) and the typed accessors are strict.
//!
//! ## Architecture
//!
//! ```text
//! Callers (any thread)
//!   |                         |
//!   | put_string / put_i64    | get_string / get_i64
//!   v                         v
//! ┌───────────────────────────────────────────────┐
//! │                  DATABASE                     │
//! │                                               │
//! │ write.rs → bounded queue → single writer      │
//! │              thread: append to active segment │
//! │              (rotate when full, schedule      │
//! │               merge past the threshold)       │
//! │                                               │
//! │ read.rs  → snapshot segment list, probe       │
//! │            newest → oldest, first match wins  │
//! │                                               │
//! │ merge.rs → shadow database → rename + swap    │
//! │ recovery.rs → replay segment-* files on open  │
//! └───────────────────────────────────────────────┘
//!              |
//!              v
//!   <dir>/segment-0  segment-1  ...  segment-N   (active = highest list slot)
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                              |
//! |----------------|------------------------------------------------------|
//! | [`lib.rs`]     | `Database` struct, open, accessors, `Debug`, `Drop`  |
//! | [`error`]      | Typed error surface (`NotFound`, `WrongType`, ...)   |
//! | [`write`]      | Put API, writer thread, segment rotation             |
//! | [`read`]       | Typed point lookups over a list snapshot             |
//! | [`merge`]      | Background + synchronous merge compaction            |
//! | [`recovery`]   | Directory scan and segment replay on open            |
//!
//! ## Concurrency Model
//!
//! All mutations flow through one writer thread consuming a bounded MPSC
//! queue, so Put effects are totally ordered and the segment-full check can
//! never race an append. Reads snapshot the segment list at call entry and
//! open their own file handles, so they block neither the writer nor each
//! other. The merge task owns the only other mutation of the segment list
//! and takes the list's write lock for the promote-and-swap step, which is
//! what makes a Get see either the old layout or the new one, never a mix.
//!
//! ## Durability
//!
//! Appends are synchronous writes to the OS; the engine does not fsync.
//! After a crash, recovery replays every `segment-*` file, tolerates a
//! partially appended trailing record, and fails on interior corruption.

mod error;
mod merge;
mod read;
mod recovery;
mod write;

pub use error::{Result, StoreError};
pub use memunit::MemoryUnit;
pub use record::{Record, Value};

use crossbeam::channel::{bounded, Sender};
use parking_lot::{Mutex, RwLock};
use segment::Segment;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use write::WriteCommand;

/// Number of segments after which a rotation schedules a background merge.
pub const DEFAULT_MERGE_THRESHOLD: usize = 10;

/// Capacity of the writer queue. Producers park once this many Puts are
/// in flight; the bound keeps a burst of writers from buffering unboundedly.
const WRITE_QUEUE_DEPTH: usize = 64;

/// State shared between the public handle, the writer thread, and the merge
/// task.
pub(crate) struct Shared {
    pub(crate) dir: PathBuf,
    pub(crate) max_segment_size: u64,
    pub(crate) merge_threshold: AtomicUsize,
    /// Oldest → newest; the last element is the active segment. "Newest" is
    /// list position, not id: after a merge, freshly promoted ids sit in
    /// front of the (older-id) active segment.
    pub(crate) segments: RwLock<Vec<Arc<Segment>>>,
    /// Highest id ever assigned; rotation and merge promotion both draw
    /// fresh ids from here.
    pub(crate) last_id: AtomicU64,
    /// Coalesces merge triggers to a single in-flight merge.
    pub(crate) merge_running: AtomicBool,
}

impl Shared {
    /// The segment currently receiving appends (tail of the list).
    pub(crate) fn active(&self) -> Arc<Segment> {
        let segments = self.segments.read();
        Arc::clone(
            segments
                .last()
                .expect("segment list is never empty while the database is open"),
        )
    }
}

/// The main storage engine handle.
///
/// Cheap to share behind an `Arc`; every method takes `&self`. Put blocks
/// until the writer thread has applied the record (or refused it); Get is
/// served directly on the calling thread.
pub struct Database {
    shared: Arc<Shared>,
    write_tx: Sender<WriteCommand>,
    writer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Database {
    /// Opens (or creates) a database in `dir`.
    ///
    /// Creates the directory if absent, removes stale shadow state from an
    /// interrupted merge, replays every `segment-*` file, and spawns the
    /// writer thread. `max_segment_size` caps the byte size of one segment
    /// (and therefore of one encoded record) and must be at least 1 byte.
    /// Plain byte counts are accepted alongside [`MemoryUnit`] quantities.
    pub fn open(
        dir: impl AsRef<Path>,
        max_segment_size: impl Into<MemoryUnit>,
    ) -> Result<Database> {
        let dir = dir.as_ref().to_path_buf();
        let max_segment_size = max_segment_size.into().bytes();
        if max_segment_size == 0 {
            return Err(StoreError::Config(
                "max segment size must be at least 1 byte".to_string(),
            ));
        }

        std::fs::create_dir_all(&dir)?;
        recovery::remove_stale_shadow(&dir);
        let (segments, last_id) = recovery::recover_segments(&dir)?;

        let shared = Arc::new(Shared {
            dir,
            max_segment_size,
            merge_threshold: AtomicUsize::new(DEFAULT_MERGE_THRESHOLD),
            segments: RwLock::new(segments),
            last_id: AtomicU64::new(last_id),
            merge_running: AtomicBool::new(false),
        });

        let (write_tx, write_rx) = bounded(WRITE_QUEUE_DEPTH);
        let writer_shared = Arc::clone(&shared);
        let writer = std::thread::Builder::new()
            .name("cinderkv-writer".to_string())
            .spawn(move || write::run_writer(writer_shared, write_rx))?;

        tracing::info!(
            dir = %shared.dir.display(),
            segments = shared.segments.read().len(),
            last_id = shared.last_id.load(Ordering::Relaxed),
            "database open"
        );

        Ok(Database {
            shared,
            write_tx,
            writer: Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
        })
    }

    /// Closes the database.
    ///
    /// Put requests already accepted by the writer are completed, then the
    /// writer seals the active segment and stops. Later Put calls fail with
    /// [`StoreError::Closed`]; reads keep working off the sealed layout.
    /// Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // The queue is FIFO, so everything enqueued before the shutdown
        // marker is drained first.
        let _ = self.write_tx.send(WriteCommand::Shutdown);
        if let Some(handle) = self.writer.lock().take() {
            if handle.join().is_err() {
                tracing::error!("writer thread panicked");
            }
        }
        Ok(())
    }

    /// The database directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// The configured per-segment byte limit.
    #[must_use]
    pub fn max_segment_size(&self) -> u64 {
        self.shared.max_segment_size
    }

    /// Number of live segments, the active one included.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.shared.segments.read().len()
    }

    /// Highest segment id assigned so far.
    #[must_use]
    pub fn last_segment_id(&self) -> u64 {
        self.shared.last_id.load(Ordering::Relaxed)
    }

    /// Logical size in bytes of the active segment.
    #[must_use]
    pub fn active_segment_size(&self) -> u64 {
        self.shared.active().size()
    }

    /// Segment count past which a rotation schedules a background merge.
    #[must_use]
    pub fn merge_threshold(&self) -> usize {
        self.shared.merge_threshold.load(Ordering::Relaxed)
    }

    /// Updates the merge threshold. Useful for testing or runtime tuning;
    /// pass `usize::MAX` to disable automatic merging.
    pub fn set_merge_threshold(&self, threshold: usize) {
        self.shared
            .merge_threshold
            .store(threshold, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dir", &self.shared.dir)
            .field("max_segment_size", &self.shared.max_segment_size)
            .field("segments", &self.segment_count())
            .field("last_segment_id", &self.last_segment_id())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Best-effort close on drop.
///
/// Dropping the handle drains the writer queue and seals the active segment
/// so the append handle is released deterministically. Errors are ignored
/// because Drop cannot propagate them; the data already handed to the OS is
/// recovered by the next open either way.
impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests;
