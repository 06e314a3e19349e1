//! # Record — on-disk record codec
//!
//! Every segment file in CinderKV is a plain concatenation of encoded
//! records: no file header, no trailer, no checksums. This crate owns the
//! record layout and the three ways the engine touches it: encoding a record
//! for append, decoding a full record during replay, and reading just the
//! value at a known offset during point lookups.
//!
//! ## Binary Record Format
//!
//! All integers are little-endian. For a key of `kl` bytes and a value of
//! `vl` bytes:
//!
//! ```text
//! [total_size: u32][key_len: u32][key][tag: u8][val_len: u32][value]
//!  0               4             8    8+kl     9+kl          13+kl
//! ```
//!
//! `total_size` counts the whole record including itself, so it always
//! equals `kl + vl + 13`. The tag is `0` for a UTF-8 string value and `1`
//! for a signed 64-bit integer; an int64 value is stored as 8 little-endian
//! bytes (`vl = 8`), making its canonical record size `kl + 21`.
//!
//! ## Example
//!
//! ```rust
//! use record::{Record, Value};
//!
//! let rec = Record::new("key", Value::Str("value".into()));
//! let bytes = rec.encode();
//! assert_eq!(bytes.len() as u64, rec.encoded_len());
//! assert_eq!(Record::decode(&bytes).unwrap(), rec);
//! ```

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{self, Read};
use thiserror::Error;

/// Tag byte identifying a UTF-8 string value.
pub const TAG_STRING: u8 = 0;
/// Tag byte identifying a signed 64-bit integer value.
pub const TAG_INT64: u8 = 1;

/// Fixed per-record framing cost: total_size(4) + key_len(4) + tag(1) + val_len(4).
pub const RECORD_OVERHEAD: u64 = 13;

/// Errors that can occur while encoding, decoding, or reading records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record with an impossible declared size, an unknown tag, length
    /// fields that disagree, invalid UTF-8, or a short read mid-record.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// A typed value stored in a record.
///
/// The store has exactly two value primitives; the 1-byte on-disk tag keeps
/// them apart so that typed reads can refuse a mismatching accessor instead
/// of coercing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A UTF-8 string.
    Str(String),
    /// A signed 64-bit integer, stored as 8 little-endian bytes.
    Int64(i64),
}

impl Value {
    /// Returns the on-disk tag byte for this value.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Value::Str(_) => TAG_STRING,
            Value::Int64(_) => TAG_INT64,
        }
    }

    /// Returns the number of bytes this value occupies on disk.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        match self {
            Value::Str(s) => s.len() as u64,
            Value::Int64(_) => 8,
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

/// A single key/typed-value unit as laid out on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The lookup key (non-empty UTF-8).
    pub key: String,
    /// The typed payload.
    pub value: Value,
}

impl Record {
    /// Constructs a record from a key and anything convertible to a [`Value`].
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Record {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns the encoded size in bytes without allocating.
    ///
    /// Always `key_len + value_len + 13`; the write path uses this for the
    /// segment-full check before the record is ever serialized.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        self.key.len() as u64 + self.value.encoded_len() + RECORD_OVERHEAD
    }

    /// Serializes the record; the result's length equals [`encoded_len`].
    ///
    /// [`encoded_len`]: Record::encoded_len
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let total = self.encoded_len() as usize;
        let mut buf = Vec::with_capacity(total);

        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        buf.push(self.value.tag());
        match &self.value {
            Value::Str(s) => {
                buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            Value::Int64(n) => {
                buf.extend_from_slice(&8u32.to_le_bytes());
                buf.extend_from_slice(&n.to_le_bytes());
            }
        }

        debug_assert_eq!(buf.len(), total);
        buf
    }

    /// Deserializes one record from the front of `buf`.
    ///
    /// Fails with [`RecordError::Corrupt`] if the declared total size
    /// exceeds the input length or is structurally impossible, if the
    /// length fields disagree, if the tag is unknown, or if the key or a
    /// string value is not valid UTF-8.
    pub fn decode(buf: &[u8]) -> Result<Record, RecordError> {
        if buf.len() < 8 {
            return Err(RecordError::Corrupt("record header truncated".into()));
        }

        let total = LittleEndian::read_u32(&buf[0..4]) as usize;
        if total > buf.len() {
            return Err(RecordError::Corrupt(format!(
                "declared size {} exceeds input length {}",
                total,
                buf.len()
            )));
        }
        // Smallest well-formed record: 1-byte key, empty string value.
        if total < RECORD_OVERHEAD as usize + 1 {
            return Err(RecordError::Corrupt(format!(
                "impossible declared size {}",
                total
            )));
        }

        let key_len = LittleEndian::read_u32(&buf[4..8]) as usize;
        if key_len == 0 || key_len + RECORD_OVERHEAD as usize > total {
            return Err(RecordError::Corrupt(format!(
                "key length {} does not fit record size {}",
                key_len, total
            )));
        }

        let key = std::str::from_utf8(&buf[8..8 + key_len])
            .map_err(|_| RecordError::Corrupt("key is not valid UTF-8".into()))?
            .to_string();

        let tag = buf[8 + key_len];
        let val_len = LittleEndian::read_u32(&buf[9 + key_len..13 + key_len]) as usize;
        if key_len + val_len + RECORD_OVERHEAD as usize != total {
            return Err(RecordError::Corrupt(format!(
                "length fields disagree: size {} vs key {} + value {}",
                total, key_len, val_len
            )));
        }

        let val_bytes = &buf[13 + key_len..total];
        let value = match tag {
            TAG_STRING => Value::Str(
                std::str::from_utf8(val_bytes)
                    .map_err(|_| RecordError::Corrupt("string value is not valid UTF-8".into()))?
                    .to_string(),
            ),
            TAG_INT64 => {
                if val_len != 8 {
                    return Err(RecordError::Corrupt(format!(
                        "int64 value length {} (expected 8)",
                        val_len
                    )));
                }
                Value::Int64(LittleEndian::read_i64(val_bytes))
            }
            other => {
                return Err(RecordError::Corrupt(format!("unknown value tag {}", other)));
            }
        };

        Ok(Record { key, value })
    }
}

/// Reads just the value of the record starting at the reader's position.
///
/// Skips the 8-byte header, the key, the tag byte, and the 4-byte value
/// length, then reads the value according to the tag. The reader is left
/// positioned immediately after the value bytes, so back-to-back calls walk
/// consecutive records. A short read anywhere is [`RecordError::Corrupt`].
pub fn read_value<R: Read>(r: &mut R) -> Result<Value, RecordError> {
    let _total = r.read_u32::<LittleEndian>().map_err(eof_is_corrupt)?;
    let key_len = r.read_u32::<LittleEndian>().map_err(eof_is_corrupt)?;

    let skipped = io::copy(&mut r.by_ref().take(u64::from(key_len)), &mut io::sink())?;
    if skipped < u64::from(key_len) {
        return Err(RecordError::Corrupt("truncated record key".into()));
    }

    let tag = r.read_u8().map_err(eof_is_corrupt)?;
    let val_len = r.read_u32::<LittleEndian>().map_err(eof_is_corrupt)?;

    match tag {
        TAG_STRING => {
            let mut val = vec![0u8; val_len as usize];
            r.read_exact(&mut val).map_err(eof_is_corrupt)?;
            let s = String::from_utf8(val)
                .map_err(|_| RecordError::Corrupt("string value is not valid UTF-8".into()))?;
            Ok(Value::Str(s))
        }
        TAG_INT64 => {
            if val_len != 8 {
                return Err(RecordError::Corrupt(format!(
                    "int64 value length {} (expected 8)",
                    val_len
                )));
            }
            let n = r.read_i64::<LittleEndian>().map_err(eof_is_corrupt)?;
            Ok(Value::Int64(n))
        }
        other => Err(RecordError::Corrupt(format!("unknown value tag {}", other))),
    }
}

/// A short read mid-record is corruption, not a plain I/O failure.
fn eof_is_corrupt(e: io::Error) -> RecordError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        RecordError::Corrupt("truncated record".into())
    } else {
        RecordError::Io(e)
    }
}

#[cfg(test)]
mod tests;
