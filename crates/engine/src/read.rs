//! Read path: typed point lookups.
//!
//! A Get snapshots the segment list once, then probes segments from newest
//! to oldest; the first segment whose index knows the key is authoritative.
//! The typed accessors are strict: a mismatching tag is `WrongType`, never a
//! coercion. The type check applies to the newest record, so an old value
//! of the right type can never shadow a newer one of the wrong type.

use record::Value;
use segment::Segment;
use std::io;
use std::sync::Arc;

use crate::{Database, Result, StoreError};

impl Database {
    /// Looks up `key`, expecting a string value.
    ///
    /// Fails with [`StoreError::NotFound`] if no segment contains the key
    /// and [`StoreError::WrongType`] if the stored value is an int64.
    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.lookup(key)? {
            Value::Str(s) => Ok(s),
            Value::Int64(_) => Err(StoreError::WrongType),
        }
    }

    /// Looks up `key`, expecting an int64 value.
    ///
    /// Fails with [`StoreError::NotFound`] if no segment contains the key
    /// and [`StoreError::WrongType`] if the stored value is a string.
    pub fn get_i64(&self, key: &str) -> Result<i64> {
        match self.lookup(key)? {
            Value::Int64(n) => Ok(n),
            Value::Str(_) => Err(StoreError::WrongType),
        }
    }

    /// Point lookup.
    ///
    /// Segments open a fresh read handle per probe, so a merge that
    /// completed after this lookup's snapshot may have deleted a
    /// snapshotted segment's file already. The key's latest value is in
    /// the post-merge layout in that case, so the lookup is retried once
    /// on a fresh snapshot before a missing file becomes the caller's
    /// problem.
    fn lookup(&self, key: &str) -> Result<Value> {
        match self.lookup_once(key) {
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                self.lookup_once(key)
            }
            other => other,
        }
    }

    /// Newest-to-oldest probe over one snapshot of the segment list.
    fn lookup_once(&self, key: &str) -> Result<Value> {
        let snapshot: Vec<Arc<Segment>> = self.shared.segments.read().clone();

        for seg in snapshot.iter().rev() {
            if let Some(value) = seg.get(key)? {
                return Ok(value);
            }
        }
        Err(StoreError::NotFound)
    }
}
