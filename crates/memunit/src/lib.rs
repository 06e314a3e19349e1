//! # MemUnit — byte-size quantities
//!
//! A small typed wrapper around a byte count so that callers can express
//! segment limits as `10 * MEGABYTE` instead of a bare `10485760`.
//!
//! The canonical accessor is [`MemoryUnit::bytes`]; everything else is
//! convenience. Units are the usual power-of-two multiples.
//!
//! ## Example
//!
//! ```rust
//! use memunit::{MemoryUnit, KILOBYTE, MEGABYTE};
//!
//! let limit = 10 * MEGABYTE;
//! assert_eq!(limit.bytes(), 10 * 1024 * 1024);
//! assert_eq!(MemoryUnit::from(2048u64), 2 * KILOBYTE);
//! ```

use std::fmt;
use std::ops::{Add, Mul, Sub};

/// A quantity of memory, stored as a number of bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoryUnit(u64);

/// One byte.
pub const BYTE: MemoryUnit = MemoryUnit(1);
/// 1024 bytes.
pub const KILOBYTE: MemoryUnit = MemoryUnit(1024);
/// 1024 kilobytes.
pub const MEGABYTE: MemoryUnit = MemoryUnit(1024 * 1024);
/// 1024 megabytes.
pub const GIGABYTE: MemoryUnit = MemoryUnit(1024 * 1024 * 1024);

impl MemoryUnit {
    /// Constructs a quantity from a raw byte count.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        MemoryUnit(bytes)
    }

    /// Returns the quantity as a number of bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl From<u64> for MemoryUnit {
    fn from(bytes: u64) -> Self {
        MemoryUnit(bytes)
    }
}

impl Add for MemoryUnit {
    type Output = MemoryUnit;

    fn add(self, rhs: MemoryUnit) -> MemoryUnit {
        MemoryUnit(self.0 + rhs.0)
    }
}

impl Sub for MemoryUnit {
    type Output = MemoryUnit;

    fn sub(self, rhs: MemoryUnit) -> MemoryUnit {
        MemoryUnit(self.0 - rhs.0)
    }
}

impl Mul<u64> for MemoryUnit {
    type Output = MemoryUnit;

    fn mul(self, rhs: u64) -> MemoryUnit {
        MemoryUnit(self.0 * rhs)
    }
}

impl Mul<MemoryUnit> for u64 {
    type Output = MemoryUnit;

    fn mul(self, rhs: MemoryUnit) -> MemoryUnit {
        MemoryUnit(self * rhs.0)
    }
}

impl fmt::Debug for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryUnit({})", self)
    }
}

impl fmt::Display for MemoryUnit {
    /// Renders the quantity in the largest unit that divides it evenly,
    /// so `2 * MEGABYTE` prints as `2 MiB` but `1500` prints as `1500 B`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u64, &str); 4] = [
            (1024 * 1024 * 1024, "GiB"),
            (1024 * 1024, "MiB"),
            (1024, "KiB"),
            (1, "B"),
        ];
        for (factor, suffix) in UNITS {
            if self.0 >= factor && self.0 % factor == 0 {
                return write!(f, "{} {}", self.0 / factor, suffix);
            }
        }
        write!(f, "0 B")
    }
}
