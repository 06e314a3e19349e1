//! Write path: the Put API, the single-consumer writer thread, and segment
//! rotation.
//!
//! Every mutation is enqueued as a [`WriteCommand`] and applied by one
//! dedicated thread, which is what totally orders Put effects and keeps the
//! segment-full check from racing an append. Each request carries a one-shot
//! reply channel; Put blocks until the writer answers.

use crossbeam::channel::{bounded, Receiver, Sender};
use record::{Record, Value};
use segment::Segment;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::{merge, Database, Result, Shared, StoreError};

/// Message consumed by the writer thread.
pub(crate) enum WriteCommand {
    /// Append one record and report the outcome.
    Apply {
        record: Record,
        reply: Sender<Result<()>>,
    },
    /// Drain nothing further; seal the active segment and stop.
    Shutdown,
}

impl Database {
    /// Stores a UTF-8 string value under `key`.
    ///
    /// Blocks until the writer has appended the record. Fails with
    /// [`StoreError::RecordTooLarge`] if the encoded record exceeds the
    /// segment limit, [`StoreError::Closed`] after [`close`](Database::close),
    /// or the underlying append error.
    pub fn put_string(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.put(Record::new(key.into(), Value::Str(value.into())))
    }

    /// Stores a signed 64-bit integer value under `key`.
    ///
    /// Same contract as [`put_string`](Database::put_string).
    pub fn put_i64(&self, key: impl Into<String>, value: i64) -> Result<()> {
        self.put(Record::new(key.into(), Value::Int64(value)))
    }

    /// Enqueues a record on the writer queue and waits for the reply.
    pub(crate) fn put(&self, record: Record) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        if record.key.is_empty() {
            return Err(StoreError::EmptyKey);
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.write_tx
            .send(WriteCommand::Apply {
                record,
                reply: reply_tx,
            })
            .map_err(|_| StoreError::Closed)?;
        // A dropped reply sender means the writer stopped mid-shutdown.
        reply_rx.recv().map_err(|_| StoreError::Closed)?
    }
}

/// Writer thread main loop: drain the queue until shutdown, then seal the
/// active segment so its append handle is released.
pub(crate) fn run_writer(shared: Arc<Shared>, rx: Receiver<WriteCommand>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            WriteCommand::Apply { record, reply } => {
                let _ = reply.send(apply(&shared, &record));
            }
            WriteCommand::Shutdown => break,
        }
    }
    shared.active().seal();
    tracing::debug!("writer stopped");
}

/// Applies a single Put: size guard, rotation if the append would cross the
/// segment limit, then the append itself.
///
/// The append runs under the segment-list read lock. A merge's
/// promote-and-swap takes the write lock, so an append and a list swap can
/// never interleave.
fn apply(shared: &Arc<Shared>, record: &Record) -> Result<()> {
    let size = record.encoded_len();
    if size > shared.max_segment_size {
        return Err(StoreError::RecordTooLarge {
            size,
            limit: shared.max_segment_size,
        });
    }

    loop {
        {
            let segments = shared.segments.read();
            let active = segments
                .last()
                .expect("segment list is never empty while the database is open");
            // A merge promotes segments under ids fresher than the
            // active's, and recovery replays files in id order. An append
            // behind those ids could be shadowed by a merged record after
            // a restart, so the active must carry the highest id before it
            // takes new records.
            let outdated = active.id() < shared.last_id.load(Ordering::SeqCst);
            if !outdated && !active.is_surpassed(shared.max_segment_size - size) {
                return active.write(record).map_err(Into::into);
            }
        }
        // Rotation takes the list's write lock, so the read guard must be
        // gone first. Re-check afterwards; a merge may have promoted again.
        rotate(shared)?;
    }
}

/// Seals the active segment and installs a fresh one with the next id.
///
/// Runs on the writer thread only. After the rotation, schedules a
/// background merge if the segment count has grown past the threshold.
fn rotate(shared: &Arc<Shared>) -> Result<Arc<Segment>> {
    let id = shared.last_id.fetch_add(1, Ordering::SeqCst) + 1;
    let fresh = Arc::new(Segment::create(&shared.dir, id)?);

    let count = {
        let mut segments = shared.segments.write();
        if let Some(prev) = segments.last() {
            prev.seal();
        }
        segments.push(Arc::clone(&fresh));
        segments.len()
    };
    tracing::debug!(segment = id, segments = count, "rotated active segment");

    if count > shared.merge_threshold.load(Ordering::Relaxed) {
        merge::schedule(shared);
    }

    Ok(fresh)
}
