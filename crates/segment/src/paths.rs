//! Segment filename convention and id parsing.
//!
//! Segment files are named `segment-<id>` with `<id>` a non-negative
//! decimal integer, no padding, directly under the database directory.

use std::io;
use std::path::{Path, PathBuf};

/// Filename prefix shared by every segment file.
pub const SEGMENT_PREFIX: &str = "segment-";

/// Returns the bare filename for a segment id, e.g. `segment-3`.
#[must_use]
pub fn segment_file_name(id: u64) -> String {
    format!("{}{}", SEGMENT_PREFIX, id)
}

/// Returns the full path of segment `id` under `dir`.
#[must_use]
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(segment_file_name(id))
}

/// Extracts the id from a segment file path, or `None` if the filename does
/// not follow the `segment-<id>` convention.
#[must_use]
pub fn parse_segment_id(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix(SEGMENT_PREFIX)?
        .parse()
        .ok()
}

/// Lists the segment ids present in `dir`, sorted ascending.
///
/// Non-segment entries are ignored. Sorting is numeric on the parsed id, so
/// `segment-10` orders after `segment-9` even though their names would not.
pub fn list_segment_ids(dir: &Path) -> io::Result<Vec<u64>> {
    let mut ids: Vec<u64> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| parse_segment_id(&e.path()))
        .collect();
    ids.sort_unstable();
    Ok(ids)
}
