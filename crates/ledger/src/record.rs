use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ealtrace_core::{
    CompanyId, ItemId, LabelPrefix, LedgerError, Market, PackId, RecordId, SerialRange,
};

/// Ledger tier a record belongs to.
///
/// The allocation graph is fixed at three tiers: Issuance records are
/// consumed by Usage records, Usage records by dispatch links. Only the
/// first two hold consumable balances, so only they are ledger records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Issuance,
    Usage,
}

impl core::fmt::Display for Tier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Tier::Issuance => f.write_str("issuance"),
            Tier::Usage => f.write_str("usage"),
        }
    }
}

/// What a record's identity is keyed on besides company/market/prefix.
///
/// Issuances are granted per pack configuration; usages are produced per
/// item. Ranges from different scopes never interact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityScope {
    Pack(PackId),
    Item(ItemId),
}

/// Partition key within which serial ranges are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordIdentity {
    pub company: CompanyId,
    pub market: Market,
    pub scope: IdentityScope,
    pub prefix: LabelPrefix,
}

/// One committed consumption against a parent ledger record.
///
/// Invariant: `total == range.size()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedSegment {
    range: SerialRange,
    total: u64,
}

impl ConsumedSegment {
    pub fn new(range: SerialRange) -> Self {
        Self {
            range,
            total: range.size(),
        }
    }

    pub fn range(&self) -> SerialRange {
        self.range
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// A consumable serial range: the generic representation of an Issuance
/// or a Usage record.
///
/// State is mutated only through `reserve`/`release`, which keep three
/// invariants for the lifetime of the record:
/// - consumed segments are pairwise non-overlapping and contained in `range`;
/// - `balance_quantity + Σ segment.total == issued_quantity`;
/// - `balance_quantity >= 0` (guaranteed by the first two).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    id: RecordId,
    tier: Tier,
    identity: RecordIdentity,
    range: SerialRange,
    issued_at: DateTime<Utc>,
    issued_quantity: u64,
    issued_quantity_in_cases: u64,
    units_per_case: u64,
    consumed_segments: Vec<ConsumedSegment>,
    balance_quantity: u64,
}

impl LedgerRecord {
    /// Create a fresh record covering `range` with a full balance.
    ///
    /// The issued quantity is the range size and must convert exactly into
    /// cases; a non-integer conversion is rejected before anything is built.
    pub fn new(
        id: RecordId,
        tier: Tier,
        identity: RecordIdentity,
        range: SerialRange,
        issued_at: DateTime<Utc>,
        units_per_case: u64,
    ) -> Result<Self, LedgerError> {
        if units_per_case == 0 {
            return Err(LedgerError::validation("units per case must be positive"));
        }
        let issued_quantity = range.size();
        let issued_quantity_in_cases =
            exact_cases(issued_quantity, units_per_case)?;

        Ok(Self {
            id,
            tier,
            identity,
            range,
            issued_at,
            issued_quantity,
            issued_quantity_in_cases,
            units_per_case,
            consumed_segments: Vec::new(),
            balance_quantity: issued_quantity,
        })
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn identity(&self) -> &RecordIdentity {
        &self.identity
    }

    pub fn range(&self) -> SerialRange {
        self.range
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn issued_quantity(&self) -> u64 {
        self.issued_quantity
    }

    pub fn issued_quantity_in_cases(&self) -> u64 {
        self.issued_quantity_in_cases
    }

    pub fn units_per_case(&self) -> u64 {
        self.units_per_case
    }

    pub fn consumed_segments(&self) -> &[ConsumedSegment] {
        &self.consumed_segments
    }

    pub fn balance_quantity(&self) -> u64 {
        self.balance_quantity
    }

    /// Case-equivalent balance, derived on read by exact division.
    ///
    /// A record whose balance is momentarily not case-aligned (a link split
    /// consumed a partial case from it) reports the conversion failure
    /// instead of a rounded figure.
    pub fn balance_quantity_in_cases(&self) -> Result<u64, LedgerError> {
        exact_cases(self.balance_quantity, self.units_per_case)
    }

    pub fn has_balance(&self) -> bool {
        self.balance_quantity > 0
    }

    pub fn is_fully_unconsumed(&self) -> bool {
        self.consumed_segments.is_empty()
    }

    /// Record a consumption of `segment`.
    ///
    /// Fails with `OverlapConflict` if any existing segment intersects the
    /// candidate; the record is unchanged on any error.
    pub fn reserve(&mut self, segment: ConsumedSegment) -> Result<(), LedgerError> {
        if !self.range.contains_range(&segment.range()) {
            return Err(LedgerError::validation(format!(
                "segment {} is outside record range {}",
                segment.range(),
                self.range
            )));
        }
        for existing in &self.consumed_segments {
            if existing.range().overlaps(&segment.range()) {
                return Err(LedgerError::OverlapConflict {
                    requested: segment.range(),
                    existing: existing.range(),
                    record: self.id.to_string(),
                });
            }
        }
        // Containment + non-overlap make this subtraction safe; keep the
        // checked form so a corrupted balance surfaces instead of wrapping.
        self.balance_quantity = self
            .balance_quantity
            .checked_sub(segment.total())
            .ok_or_else(|| {
                LedgerError::store(format!("balance underflow on record {}", self.id))
            })?;
        self.consumed_segments.push(segment);
        Ok(())
    }

    /// Remove a segment exactly matching an existing one, restoring balance.
    ///
    /// Fails with `SegmentNotFound` if no exact match exists (double
    /// reversal or tampered state).
    pub fn release(&mut self, range: SerialRange) -> Result<(), LedgerError> {
        let pos = self
            .consumed_segments
            .iter()
            .position(|s| s.range() == range)
            .ok_or(LedgerError::SegmentNotFound {
                segment: range,
                record: self.id.to_string(),
            })?;
        let segment = self.consumed_segments.remove(pos);
        self.balance_quantity += segment.total();
        Ok(())
    }
}

/// Exact raw-to-case conversion; never rounds.
pub fn exact_cases(quantity: u64, units_per_case: u64) -> Result<u64, LedgerError> {
    if units_per_case == 0 || quantity % units_per_case != 0 {
        return Err(LedgerError::NonIntegerCaseConversion {
            quantity,
            units_per_case,
        });
    }
    Ok(quantity / units_per_case)
}
