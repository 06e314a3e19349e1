//! Merge compaction: rewrite every sealed segment into a fresh segment set
//! holding only the latest value per key.
//!
//! The merge never touches the active segment, so writes keep flowing while
//! the merged layout is assembled in a shadow database under
//! `<dir>/shadow`. Promotion (renaming the shadow's files to fresh ids and
//! swapping the segment list) happens under the list's write lock, so no
//! Put interleaves with it and a Get sees either the old layout or the new
//! one. A failure anywhere aborts the merge, leaves the original segments
//! serving, and is reported through the log; merge is retried only by the
//! next threshold crossing.

use memunit::MemoryUnit;
use record::Record;
use segment::{segment_path, Segment};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::{Database, Result, Shared, StoreError};

/// Name of the transient merge workspace under the database directory.
pub(crate) const SHADOW_DIR: &str = "shadow";

impl Database {
    /// Runs a merge now, on the calling thread.
    ///
    /// Compacts every segment except the active one into freshly assigned
    /// ids, then deletes the retired files. Returns `Ok` without doing
    /// anything if a merge is already in flight or there is nothing to
    /// compact. Automatic merges scheduled by rotation go through the same
    /// path on a background thread.
    pub fn merge(&self) -> Result<()> {
        if self.shared.merge_running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _flag = MergeFlag(&self.shared);
        run(&self.shared)
    }
}

/// Schedules a background merge; concurrent triggers coalesce into the one
/// already in flight.
pub(crate) fn schedule(shared: &Arc<Shared>) {
    if shared.merge_running.swap(true, Ordering::SeqCst) {
        return;
    }

    let task = Arc::clone(shared);
    let spawned = std::thread::Builder::new()
        .name("cinderkv-merge".to_string())
        .spawn(move || {
            let _flag = MergeFlag(&task);
            if let Err(e) = run(&task) {
                tracing::error!(error = %e, "merge failed; serving from the pre-merge layout");
            }
        });
    if let Err(e) = spawned {
        shared.merge_running.store(false, Ordering::SeqCst);
        tracing::error!(error = %e, "failed to spawn merge thread");
    }
}

/// Clears the merge-in-flight flag when the merge ends, however it ends.
struct MergeFlag<'a>(&'a Shared);

impl Drop for MergeFlag<'_> {
    fn drop(&mut self) {
        self.0.merge_running.store(false, Ordering::SeqCst);
    }
}

/// The merge protocol proper.
fn run(shared: &Shared) -> Result<()> {
    // 1. Snapshot the sealed segments in their current order. The active
    //    segment stays out: its records are newer than anything merged and
    //    it keeps absorbing writes while we work.
    let (old, active) = {
        let segments = shared.segments.read();
        match segments.split_last() {
            Some((active, older)) if !older.is_empty() => {
                (older.to_vec(), Arc::clone(active))
            }
            _ => return Ok(()),
        }
    };

    // 2. Latest record per key across the old segments, oldest first so a
    //    later record overwrites an earlier one. Keys the active segment
    //    already holds are skipped; their merged value would be stale.
    let mut latest: HashMap<String, Record> = HashMap::new();
    for seg in &old {
        for item in seg.iter()? {
            let rec = item?;
            if active.has(&rec.key) {
                continue;
            }
            latest.insert(rec.key.clone(), rec);
        }
    }

    let shadow_dir = shared.dir.join(SHADOW_DIR);
    if shadow_dir.exists() {
        fs::remove_dir_all(&shadow_dir)?;
    }

    let result = build_and_promote(shared, &shadow_dir, latest, &old);
    // The shadow directory goes away on success and failure alike.
    if shadow_dir.exists() {
        let _ = fs::remove_dir_all(&shadow_dir);
    }
    result?;

    // 6. Retire the old files. The list no longer references them, so a
    //    failed unlink only leaks disk space until the next merge.
    for seg in &old {
        if let Err(e) = fs::remove_file(seg.path()) {
            tracing::warn!(
                segment = seg.id(),
                error = %e,
                "failed to delete retired segment file"
            );
        }
    }
    Ok(())
}

/// Steps 3–5: build the merged layout in the shadow database, then promote
/// its files into the parent directory under the segment-list write lock.
fn build_and_promote(
    shared: &Shared,
    shadow_dir: &Path,
    latest: HashMap<String, Record>,
    old: &[Arc<Segment>],
) -> Result<()> {
    // 3. A shadow database with the same segment limit does the rotation
    //    bookkeeping for us. Its only producer is this loop, so automatic
    //    merging is disabled: a recursive shadow merge would rename files
    //    out from under this one.
    let shadow = Database::open(shadow_dir, MemoryUnit::from_bytes(shared.max_segment_size))?;
    shadow.set_merge_threshold(usize::MAX);
    for record in latest.into_values() {
        shadow.put(record)?;
    }
    shadow.close()?;
    let shadow_ids = segment::list_segment_ids(shadow_dir)?;

    // 4–5. Exclusive access: the writer cannot append or rotate and no new
    // list snapshot is handed out while files move and the list is swapped.
    let mut segments = shared.segments.write();

    let mut promoted: Vec<Arc<Segment>> = Vec::with_capacity(shadow_ids.len());
    for shadow_id in shadow_ids {
        let id = shared.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let target = segment_path(&shared.dir, id);
        let outcome = fs::rename(segment_path(shadow_dir, shadow_id), &target)
            .map_err(StoreError::from)
            .and_then(|()| Ok(Arc::new(Segment::recover(&shared.dir, id)?)));
        match outcome {
            Ok(seg) => promoted.push(seg),
            Err(e) => {
                // Abort: drop the files promoted so far. The old segments
                // are untouched and still listed, so nothing is lost.
                let _ = fs::remove_file(&target);
                for seg in &promoted {
                    let _ = fs::remove_file(seg.path());
                }
                return Err(e);
            }
        }
    }

    // Swap: promoted segments replace exactly the snapshotted old ones.
    // Segments born from rotations that raced the build phase stay, in
    // order, behind the promoted set, so list position still means age.
    let old_ids: HashSet<u64> = old.iter().map(|s| s.id()).collect();
    let produced = promoted.len();
    let mut next: Vec<Arc<Segment>> = promoted;
    next.extend(
        segments
            .iter()
            .filter(|s| !old_ids.contains(&s.id()))
            .cloned(),
    );
    *segments = next;

    tracing::info!(
        retired = old.len(),
        produced = produced,
        segments = segments.len(),
        "merge complete"
    );
    Ok(())
}
