//! Storage boundary consumed by the allocation engine.
//!
//! The engine never touches a backend directly; every read and write of a
//! single operation goes through one [`LedgerTransaction`], and nothing a
//! transaction wrote is visible to anyone else until `commit` succeeds.

use ealtrace_core::{ChildRecordId, ItemId, LabelPrefix, LedgerResult, RecordId, SerialRange};
use ealtrace_ledger::{ChildConsumptionRecord, ConsumerRef, LedgerRecord, RecordIdentity, Tier};

/// One isolated unit of work against the ledger collections.
///
/// Implementations must guarantee, for the lifetime of the value:
/// - **snapshot isolation**: reads observe the state as of `begin`, plus
///   this transaction's own writes;
/// - **atomicity**: `commit` installs every write or none; dropping the
///   transaction without committing discards every write;
/// - **conflict detection**: `commit` fails with
///   [`LedgerError::StoreConflict`](ealtrace_core::LedgerError::StoreConflict)
///   if another transaction committed since `begin`.
pub trait LedgerTransaction {
    /// Records of the identity whose range intersects `range` and which
    /// still have a positive balance, ascending by `range.from`.
    ///
    /// The ordering is the allocation tie-break rule: earlier-issued
    /// material (by range start) is consumed first.
    fn find_candidates(
        &self,
        tier: Tier,
        identity: &RecordIdentity,
        range: SerialRange,
    ) -> LedgerResult<Vec<LedgerRecord>>;

    /// All records of the identity whose range intersects `range`,
    /// regardless of balance. Used to reject overlapping grants.
    fn find_overlapping(
        &self,
        tier: Tier,
        identity: &RecordIdentity,
        range: SerialRange,
    ) -> LedgerResult<Vec<LedgerRecord>>;

    /// The most recently issued record of the identity whose range fully
    /// contains `range`, if any (single-parent matching policy).
    fn latest_covering(
        &self,
        tier: Tier,
        identity: &RecordIdentity,
        range: SerialRange,
    ) -> LedgerResult<Option<LedgerRecord>>;

    fn load_record(&self, tier: Tier, id: RecordId) -> LedgerResult<LedgerRecord>;

    /// Create or replace a ledger record.
    fn put_record(&mut self, record: LedgerRecord) -> LedgerResult<()>;

    fn delete_record(&mut self, tier: Tier, id: RecordId) -> LedgerResult<()>;

    fn create_child(&mut self, child: ChildConsumptionRecord) -> LedgerResult<()>;

    fn delete_child(&mut self, id: ChildRecordId) -> LedgerResult<()>;

    /// Children created on behalf of `consumer`, in creation order.
    fn children_of(&self, consumer: &ConsumerRef) -> LedgerResult<Vec<ChildConsumptionRecord>>;

    /// Records of a tier whose range contains `serial` under `prefix`.
    fn records_containing(
        &self,
        tier: Tier,
        prefix: LabelPrefix,
        serial: u64,
    ) -> LedgerResult<Vec<LedgerRecord>>;

    /// Child records whose range contains `serial` under `prefix`.
    fn children_containing(
        &self,
        prefix: LabelPrefix,
        serial: u64,
    ) -> LedgerResult<Vec<ChildConsumptionRecord>>;

    /// Atomically install this transaction's writes.
    fn commit(self) -> LedgerResult<()>;
}

/// A backend able to open isolated transactions.
pub trait LedgerStore {
    type Tx<'a>: LedgerTransaction
    where
        Self: 'a;

    fn begin(&self) -> LedgerResult<Self::Tx<'_>>;
}

impl<'s, S> LedgerStore for &'s S
where
    S: LedgerStore,
{
    type Tx<'a>
        = S::Tx<'a>
    where
        Self: 'a;

    fn begin(&self) -> LedgerResult<Self::Tx<'_>> {
        (**self).begin()
    }
}

impl<S> LedgerStore for std::sync::Arc<S>
where
    S: LedgerStore,
{
    type Tx<'a>
        = S::Tx<'a>
    where
        Self: 'a;

    fn begin(&self) -> LedgerResult<Self::Tx<'_>> {
        (**self).begin()
    }
}

/// Read-only reference-data lookups the engine's callers need.
pub trait ReferenceData {
    /// Units (bottles) per case for an item. Every case conversion in the
    /// ledger uses this factor.
    fn units_per_case(&self, item: ItemId) -> LedgerResult<u64>;
}
