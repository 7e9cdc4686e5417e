//! Domain error model.

use thiserror::Error;

use crate::range::SerialRange;

/// Result type used across the ledger layers.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Every variant is a recoverable, expected outcome of an operation, not a
/// defect. The surrounding transport layer maps these to user-facing
/// messages/status codes; nothing here carries presentation concerns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or zero/negative-size range input.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// A value failed validation (e.g. malformed prefix, mismatched quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A quantity does not divide evenly by the units-per-case factor.
    #[error("quantity {quantity} is not a whole number of cases ({units_per_case} units per case)")]
    NonIntegerCaseConversion { quantity: u64, units_per_case: u64 },

    /// No candidate parent records exist for the identity/range.
    #[error("no ledger records with remaining balance cover the requested range")]
    NoCapacity,

    /// Requested sub-range intersects an already-consumed segment.
    #[error("range {requested} overlaps already-consumed range {existing} on record {record}")]
    OverlapConflict {
        requested: SerialRange,
        existing: SerialRange,
        record: String,
    },

    /// Candidates together cannot cover the full requested quantity.
    #[error("allocation incomplete: {remaining} serials unallocated")]
    IncompleteAllocation { remaining: u64 },

    /// A dispatch-item link would exceed its case cap.
    #[error("linking {requested} cases exceeds the item cap ({cap} cases, {linked} already linked)")]
    CapacityExceeded {
        cap: u64,
        linked: u64,
        requested: u64,
    },

    /// Reversal target segment no longer exists on its parent record
    /// (double reversal or tampered state).
    #[error("segment {segment} not found on record {record}")]
    SegmentNotFound {
        segment: SerialRange,
        record: String,
    },

    /// Unlink target is not among the dispatch item's EAL links.
    #[error("EAL link not found for unlinking")]
    LinkNotFound,

    /// A referenced entity (record, item, dispatch) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying transaction aborted due to concurrent modification.
    #[error("store transaction conflict")]
    StoreConflict,

    /// Storage-layer failure outside the ledger's taxonomy.
    #[error("store error: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}
