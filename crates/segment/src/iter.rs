//! Lazy record iterator over one segment file.
//!
//! Used by recovery and by merge. Reads sequentially from a fresh file
//! descriptor, decoding one record at a time.
//!
//! ## Termination
//!
//! - **Clean EOF** at a record boundary → iteration ends.
//! - **Truncated tail** (the file ends mid-record, e.g. after a crash during
//!   an append) → iteration ends; every complete record before it was
//!   yielded.
//! - **Structural corruption** (impossible declared size, bad tag, length
//!   fields that disagree) → yields the error once, then ends.

use byteorder::{LittleEndian, ReadBytesExt};
use record::{Record, RecordError, RECORD_OVERHEAD};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Reject absurd declared sizes before allocating a buffer for them. A real
/// record is bounded by the segment limit, which is nowhere near this.
const MAX_RECORD_BYTES: u32 = 256 * 1024 * 1024;

/// Iterator over the decoded records of a segment file, in insertion order.
pub struct SegmentIter {
    rdr: BufReader<File>,
    done: bool,
}

impl SegmentIter {
    /// Opens a fresh descriptor on the segment file at `path`.
    pub fn open(path: &Path) -> io::Result<SegmentIter> {
        Ok(SegmentIter {
            rdr: BufReader::new(File::open(path)?),
            done: false,
        })
    }
}

impl Iterator for SegmentIter {
    type Item = Result<Record, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Size prefix. Clean EOF and a tail holding fewer than 4 bytes both
        // end the iteration without an error.
        let total = match self.rdr.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(RecordError::Io(e)));
            }
        };

        if u64::from(total) < RECORD_OVERHEAD + 1 || total > MAX_RECORD_BYTES {
            self.done = true;
            return Some(Err(RecordError::Corrupt(format!(
                "impossible declared size {}",
                total
            ))));
        }

        let mut buf = vec![0u8; total as usize];
        buf[0..4].copy_from_slice(&total.to_le_bytes());
        match self.rdr.read_exact(&mut buf[4..]) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                // Truncated tail: the preceding records are all intact.
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(RecordError::Io(e)));
            }
        }

        match Record::decode(&buf) {
            Ok(rec) => Some(Ok(rec)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
