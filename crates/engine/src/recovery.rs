//! Cold-start path: directory scan and segment replay.
//!
//! Open enumerates `segment-*` files, replays each one in id order to
//! rebuild its hash index, and re-activates the newest for appends. A
//! partially appended trailing record is tolerated (and trimmed before new
//! appends land); a structurally corrupt record in the interior of a
//! segment fails the open.

use segment::{list_segment_ids, Segment};
use std::path::Path;
use std::sync::Arc;

use crate::{merge, Result};

/// Scans `dir` and rebuilds the segment list, oldest to newest.
///
/// Returns the list and the highest id seen. If no segment files exist,
/// creates `segment-0` as the empty active segment. The last segment is
/// reopened for append; all others stay sealed.
pub(crate) fn recover_segments(dir: &Path) -> Result<(Vec<Arc<Segment>>, u64)> {
    let ids = list_segment_ids(dir)?;
    if ids.is_empty() {
        let seg = Segment::create(dir, 0)?;
        return Ok((vec![Arc::new(seg)], 0));
    }

    let mut segments = Vec::with_capacity(ids.len());
    for &id in &ids {
        segments.push(Arc::new(Segment::recover(dir, id)?));
    }

    if let Some(active) = segments.last() {
        let dropped = active.activate()?;
        if dropped > 0 {
            tracing::warn!(
                segment = active.id(),
                bytes = dropped,
                "dropped partial tail left by an interrupted append"
            );
        }
    }

    Ok((segments, ids[ids.len() - 1]))
}

/// Removes a leftover `shadow/` directory from a merge that was interrupted
/// by a crash. The shadow is transient state; the parent directory's
/// segments are the source of truth.
pub(crate) fn remove_stale_shadow(dir: &Path) {
    let shadow = dir.join(merge::SHADOW_DIR);
    if shadow.is_dir() {
        tracing::warn!(
            path = %shadow.display(),
            "removing stale shadow directory from an interrupted merge"
        );
        let _ = std::fs::remove_dir_all(&shadow);
    }
}
