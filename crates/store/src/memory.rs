//! In-memory ledger store with snapshot transactions.
//!
//! Intended for tests/dev and as the reference for the store contract.
//! Not optimized for performance: `begin` clones the full state, and
//! commit conflicts are detected by a single commit counter (any
//! concurrent commit conflicts, which is strictly stronger isolation
//! than the contract demands).

use std::collections::HashMap;
use std::sync::RwLock;

use ealtrace_core::{
    ChildRecordId, LabelPrefix, LedgerError, LedgerResult, RecordId, SerialRange,
};
use ealtrace_ledger::{ChildConsumptionRecord, ConsumerRef, LedgerRecord, RecordIdentity, Tier};

use ealtrace_allocation::{LedgerStore, LedgerTransaction};

#[derive(Debug, Clone, Default)]
struct StoreState {
    records: HashMap<(Tier, RecordId), LedgerRecord>,
    children: HashMap<ChildRecordId, ChildConsumptionRecord>,
    committed: u64,
}

/// In-memory transactional ledger store.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<StoreState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> LedgerError {
        LedgerError::store("lock poisoned")
    }
}

impl LedgerStore for InMemoryLedgerStore {
    type Tx<'a> = MemoryTransaction<'a>;

    fn begin(&self) -> LedgerResult<Self::Tx<'_>> {
        let state = self.state.read().map_err(|_| Self::lock_err())?;
        Ok(MemoryTransaction {
            store: self,
            base_version: state.committed,
            working: state.clone(),
        })
    }
}

/// One snapshot-isolated unit of work against [`InMemoryLedgerStore`].
///
/// All reads and writes act on a private copy of the state taken at
/// `begin`; `commit` installs the copy atomically unless another
/// transaction committed first. Dropping without commit discards
/// everything.
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    store: &'a InMemoryLedgerStore,
    base_version: u64,
    working: StoreState,
}

impl MemoryTransaction<'_> {
    fn child_prefix(&self, child: &ChildConsumptionRecord) -> Option<LabelPrefix> {
        match child.consumer {
            ConsumerRef::DispatchLink { prefix, .. } => Some(prefix),
            // Usage-creation children inherit the prefix of the issuance
            // they consumed.
            ConsumerRef::Usage { .. } => self
                .working
                .records
                .get(&(child.parent_tier, child.parent_id))
                .map(|parent| parent.identity().prefix),
        }
    }
}

impl LedgerTransaction for MemoryTransaction<'_> {
    fn find_candidates(
        &self,
        tier: Tier,
        identity: &RecordIdentity,
        range: SerialRange,
    ) -> LedgerResult<Vec<LedgerRecord>> {
        let mut candidates: Vec<LedgerRecord> = self
            .working
            .records
            .values()
            .filter(|r| {
                r.tier() == tier
                    && r.identity() == identity
                    && r.range().overlaps(&range)
                    && r.has_balance()
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|r| r.range().from());
        Ok(candidates)
    }

    fn find_overlapping(
        &self,
        tier: Tier,
        identity: &RecordIdentity,
        range: SerialRange,
    ) -> LedgerResult<Vec<LedgerRecord>> {
        let mut records: Vec<LedgerRecord> = self
            .working
            .records
            .values()
            .filter(|r| r.tier() == tier && r.identity() == identity && r.range().overlaps(&range))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.range().from());
        Ok(records)
    }

    fn latest_covering(
        &self,
        tier: Tier,
        identity: &RecordIdentity,
        range: SerialRange,
    ) -> LedgerResult<Option<LedgerRecord>> {
        Ok(self
            .working
            .records
            .values()
            .filter(|r| {
                r.tier() == tier && r.identity() == identity && r.range().contains_range(&range)
            })
            .max_by_key(|r| r.issued_at())
            .cloned())
    }

    fn load_record(&self, tier: Tier, id: RecordId) -> LedgerResult<LedgerRecord> {
        self.working
            .records
            .get(&(tier, id))
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("{tier} record {id}")))
    }

    fn put_record(&mut self, record: LedgerRecord) -> LedgerResult<()> {
        self.working
            .records
            .insert((record.tier(), record.id()), record);
        Ok(())
    }

    fn delete_record(&mut self, tier: Tier, id: RecordId) -> LedgerResult<()> {
        self.working
            .records
            .remove(&(tier, id))
            .map(|_| ())
            .ok_or_else(|| LedgerError::not_found(format!("{tier} record {id}")))
    }

    fn create_child(&mut self, child: ChildConsumptionRecord) -> LedgerResult<()> {
        self.working.children.insert(child.id, child);
        Ok(())
    }

    fn delete_child(&mut self, id: ChildRecordId) -> LedgerResult<()> {
        self.working
            .children
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::not_found(format!("child record {id}")))
    }

    fn children_of(&self, consumer: &ConsumerRef) -> LedgerResult<Vec<ChildConsumptionRecord>> {
        let mut children: Vec<ChildConsumptionRecord> = self
            .working
            .children
            .values()
            .filter(|c| c.consumer == *consumer)
            .cloned()
            .collect();
        children.sort_by_key(|c| c.range.from());
        Ok(children)
    }

    fn records_containing(
        &self,
        tier: Tier,
        prefix: LabelPrefix,
        serial: u64,
    ) -> LedgerResult<Vec<LedgerRecord>> {
        let mut records: Vec<LedgerRecord> = self
            .working
            .records
            .values()
            .filter(|r| {
                r.tier() == tier && r.identity().prefix == prefix && r.range().contains(serial)
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.range().from());
        Ok(records)
    }

    fn children_containing(
        &self,
        prefix: LabelPrefix,
        serial: u64,
    ) -> LedgerResult<Vec<ChildConsumptionRecord>> {
        let mut children: Vec<ChildConsumptionRecord> = self
            .working
            .children
            .values()
            .filter(|c| c.range.contains(serial) && self.child_prefix(c) == Some(prefix))
            .cloned()
            .collect();
        children.sort_by_key(|c| c.range.from());
        Ok(children)
    }

    fn commit(mut self) -> LedgerResult<()> {
        let mut state = self
            .store
            .state
            .write()
            .map_err(|_| InMemoryLedgerStore::lock_err())?;
        if state.committed != self.base_version {
            return Err(LedgerError::StoreConflict);
        }
        self.working.committed = self.base_version + 1;
        *state = self.working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ealtrace_allocation::TransactionCoordinator;
    use ealtrace_core::{CompanyId, LedgerResult, Market, PackId};
    use ealtrace_ledger::IdentityScope;

    fn test_identity() -> RecordIdentity {
        RecordIdentity {
            company: CompanyId::new(),
            market: Market::Local,
            scope: IdentityScope::Pack(PackId::new()),
            prefix: LabelPrefix::parse("EAL").unwrap(),
        }
    }

    fn test_record(identity: RecordIdentity, from: u64, to: u64) -> LedgerRecord {
        LedgerRecord::new(
            RecordId::new(),
            Tier::Issuance,
            identity,
            SerialRange::new(from, to).unwrap(),
            Utc::now(),
            1,
        )
        .unwrap()
    }

    #[test]
    fn uncommitted_writes_are_invisible() {
        let store = InMemoryLedgerStore::new();
        let identity = test_identity();

        {
            let mut tx = store.begin().unwrap();
            tx.put_record(test_record(identity, 1, 100)).unwrap();
            // Dropped without commit.
        }

        let tx = store.begin().unwrap();
        assert!(tx
            .find_overlapping(Tier::Issuance, &identity, SerialRange::new(1, 100).unwrap())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn concurrent_commit_conflicts() {
        let store = InMemoryLedgerStore::new();
        let identity = test_identity();

        let mut tx1 = store.begin().unwrap();
        let mut tx2 = store.begin().unwrap();

        tx1.put_record(test_record(identity, 1, 100)).unwrap();
        tx2.put_record(test_record(identity, 101, 200)).unwrap();

        tx1.commit().unwrap();
        assert_eq!(tx2.commit().unwrap_err(), LedgerError::StoreConflict);
    }

    #[test]
    fn snapshot_does_not_see_later_commits() {
        let store = InMemoryLedgerStore::new();
        let identity = test_identity();

        let early = store.begin().unwrap();

        let mut writer = store.begin().unwrap();
        writer.put_record(test_record(identity, 1, 100)).unwrap();
        writer.commit().unwrap();

        // The earlier snapshot still reads the state as of its begin.
        assert!(early
            .find_overlapping(Tier::Issuance, &identity, SerialRange::new(1, 100).unwrap())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn coordinator_retries_through_a_conflict() {
        // The coordinator owns an `Arc` of the store so the retry closure
        // can open interfering transactions against a clone of the handle.
        let store = std::sync::Arc::new(InMemoryLedgerStore::new());
        let identity = test_identity();
        let coordinator = TransactionCoordinator::new(std::sync::Arc::clone(&store));

        let mut interfered = false;
        let result: LedgerResult<()> = coordinator.run(|tx| {
            tx.put_record(test_record(identity, 1, 100))?;
            if !interfered {
                // Simulate another writer landing between begin and commit.
                interfered = true;
                let mut other = store.begin().unwrap();
                other.put_record(test_record(identity, 201, 300)).unwrap();
                other.commit().unwrap();
            }
            Ok(())
        });
        result.unwrap();

        let tx = store.begin().unwrap();
        let all = tx
            .find_overlapping(Tier::Issuance, &identity, SerialRange::new(1, 300).unwrap())
            .unwrap();
        // Both the interfering write and the retried write survived.
        assert_eq!(all.len(), 2);
    }
}
