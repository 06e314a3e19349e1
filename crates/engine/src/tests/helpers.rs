use std::path::Path;

/// Counts the `segment-*` files on disk (the shadow directory, if any, is
/// not included).
pub fn count_segment_files(dir: &Path) -> usize {
    segment::list_segment_ids(dir).unwrap().len()
}

/// A segment limit that fits exactly three `keyN=valueN` string records:
/// each encodes to 4 (key) + 6 (value) + 13 (framing) = 23 bytes.
pub const THREE_RECORD_LIMIT: u64 = 23 * 3;
