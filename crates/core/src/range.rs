//! Closed integer serial interval `[from, to]`.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Largest representable serial number: labels print serials as 10-digit
/// strings, so the numeric space is `1..=9_999_999_999`.
pub const MAX_SERIAL: u64 = 9_999_999_999;

/// A closed, non-empty interval of serial numbers.
///
/// Invariant (enforced at construction): `1 <= from <= to <= MAX_SERIAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerialRange {
    from: u64,
    to: u64,
}

impl SerialRange {
    pub fn new(from: u64, to: u64) -> Result<Self, LedgerError> {
        if from == 0 {
            return Err(LedgerError::invalid_range("serials start at 1"));
        }
        if from > to {
            return Err(LedgerError::invalid_range(format!(
                "from ({from}) must not exceed to ({to})"
            )));
        }
        if to > MAX_SERIAL {
            return Err(LedgerError::invalid_range(format!(
                "to ({to}) exceeds the 10-digit serial space"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> u64 {
        self.from
    }

    pub fn to(&self) -> u64 {
        self.to
    }

    /// Number of serials in the range (`to - from + 1`).
    pub fn size(&self) -> u64 {
        self.to - self.from + 1
    }

    pub fn contains(&self, serial: u64) -> bool {
        self.from <= serial && serial <= self.to
    }

    pub fn contains_range(&self, other: &SerialRange) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    /// True iff the two ranges share at least one serial.
    pub fn overlaps(&self, other: &SerialRange) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    /// The shared sub-range, if any.
    pub fn intersect(&self, other: &SerialRange) -> Option<SerialRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(SerialRange {
            from: self.from.max(other.from),
            to: self.to.min(other.to),
        })
    }
}

impl core::fmt::Display for SerialRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}-{}]", self.from, self.to)
    }
}
