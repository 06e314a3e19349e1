use super::helpers::{count_segment_files, THREE_RECORD_LIMIT};
use crate::*;
use anyhow::Result;
use std::time::Duration;
use tempfile::tempdir;

/// Writes the two S-shaped batches used throughout: three exact-fit records
/// filling segment 0, then three more that rotate twice.
fn seed_three_segments(db: &Database) -> Result<()> {
    for (k, v) in [("key1", "value1"), ("key2", "value2"), ("key3", "value3")] {
        db.put_string(k, v)?;
    }
    for (k, v) in [("key1", "value1new"), ("key2", "new"), ("key4", "value4new")] {
        db.put_string(k, v)?;
    }
    assert_eq!(db.segment_count(), 3);
    Ok(())
}

fn assert_seeded_values(db: &Database) -> Result<()> {
    assert_eq!(db.get_string("key1")?, "value1new");
    assert_eq!(db.get_string("key2")?, "new");
    assert_eq!(db.get_string("key3")?, "value3");
    assert_eq!(db.get_string("key4")?, "value4new");
    Ok(())
}

// --------------------- Merge preserves latest ---------------------

#[test]
fn merge_compacts_sealed_segments_and_keeps_latest_values() -> Result<()> {
    let dir = tempdir()?;
    let db = Database::open(dir.path(), THREE_RECORD_LIMIT)?;
    seed_three_segments(&db)?;

    db.merge()?;

    // Two sealed segments collapse into one; the active one is untouched.
    assert_eq!(db.segment_count(), 2);
    assert_eq!(count_segment_files(dir.path()), 2);
    assert_eq!(db.last_segment_id(), 3);
    assert_seeded_values(&db)?;

    // The shadow workspace is gone.
    assert!(!dir.path().join("shadow").exists());
    Ok(())
}

#[test]
fn merge_survives_close_and_reopen() -> Result<()> {
    let dir = tempdir()?;
    {
        let db = Database::open(dir.path(), THREE_RECORD_LIMIT)?;
        seed_three_segments(&db)?;
        db.merge()?;
        db.close()?;
    }

    let db = Database::open(dir.path(), THREE_RECORD_LIMIT)?;
    assert_eq!(db.segment_count(), 2);
    assert_eq!(db.last_segment_id(), 3);
    assert_seeded_values(&db)?;
    Ok(())
}

#[test]
fn merge_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let db = Database::open(dir.path(), THREE_RECORD_LIMIT)?;
    seed_three_segments(&db)?;

    db.merge()?;
    db.merge()?;

    assert_eq!(db.segment_count(), 2);
    assert_seeded_values(&db)?;
    Ok(())
}

#[test]
fn merge_with_single_segment_is_a_noop() -> Result<()> {
    let dir = tempdir()?;
    let db = Database::open(dir.path(), THREE_RECORD_LIMIT)?;
    db.put_string("key1", "value1")?;

    db.merge()?;
    assert_eq!(db.segment_count(), 1);
    assert_eq!(db.last_segment_id(), 0);
    assert_eq!(db.get_string("key1")?, "value1");
    Ok(())
}

#[test]
fn merge_skips_keys_held_by_the_active_segment() -> Result<()> {
    let dir = tempdir()?;
    let db = Database::open(dir.path(), THREE_RECORD_LIMIT)?;

    // Overwrite one key until the latest copy lives in the active segment.
    for _ in 0..4 {
        db.put_string("key1", "value1")?;
    }
    assert_eq!(db.segment_count(), 2);

    db.merge()?;
    assert_eq!(db.segment_count(), 2);
    assert_eq!(db.get_string("key1")?, "value1");

    // Close and reopen to prove the promoted layout replays cleanly.
    db.close()?;
    let db = Database::open(dir.path(), THREE_RECORD_LIMIT)?;
    assert_eq!(db.get_string("key1")?, "value1");
    Ok(())
}

// --------------------- Merge + writes ---------------------

#[test]
fn writes_after_merge_keep_working() -> Result<()> {
    let dir = tempdir()?;
    let db = Database::open(dir.path(), THREE_RECORD_LIMIT)?;
    seed_three_segments(&db)?;
    db.merge()?;

    db.put_i64("key5", 123)?;
    db.put_string("key6", "123")?;

    assert_eq!(db.get_i64("key5")?, 123);
    assert_eq!(db.get_string("key6")?, "123");
    assert!(matches!(
        db.get_string("key5").unwrap_err(),
        StoreError::WrongType
    ));
    assert!(matches!(
        db.get_i64("key6").unwrap_err(),
        StoreError::WrongType
    ));
    assert_seeded_values(&db)?;
    Ok(())
}

// --------------------- Automatic merging ---------------------

#[test]
fn auto_merge_fires_past_the_threshold() -> Result<()> {
    let dir = tempdir()?;
    let db = Database::open(dir.path(), THREE_RECORD_LIMIT)?;
    db.set_merge_threshold(2);

    // Distinct keys so every segment keeps content; enough rotations to
    // cross the threshold several times over.
    for i in 0..20u64 {
        db.put_string(format!("key{:02}", i), "padding-val")?;
    }

    // The merge runs on a background thread; give it a moment. A trigger
    // that raced an in-flight merge coalesces, so the settled count can sit
    // slightly above the threshold, but nowhere near the ten segments these
    // writes produce unmerged.
    let mut waited = 0;
    while db.segment_count() > 3 && waited < 200 {
        std::thread::sleep(Duration::from_millis(10));
        waited += 1;
    }
    assert!(
        db.segment_count() < 6,
        "expected background merging to shrink the layout, still at {}",
        db.segment_count()
    );

    for i in 0..20u64 {
        assert_eq!(db.get_string(&format!("key{:02}", i))?, "padding-val");
    }
    Ok(())
}
