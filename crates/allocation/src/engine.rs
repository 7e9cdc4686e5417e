//! Greedy serial-range allocation and its symmetric reversal.
//!
//! One engine serves both consuming tiers: Usage-over-Issuance and
//! DispatchLink-over-Usage are the same walk applied at different
//! identities, selected by [`MatchPolicy`] rather than duplicated.

use chrono::{DateTime, Utc};

use ealtrace_core::{
    CompanyId, ItemId, LabelPrefix, LedgerError, LedgerResult, Market, PackId, RecordId,
    SerialRange,
};
use ealtrace_ledger::{
    exact_cases, ChildConsumptionRecord, ConsumedSegment, ConsumerRef, IdentityScope,
    LedgerRecord, RecordIdentity, Tier,
};

use crate::coordinator::TransactionCoordinator;
use crate::store::{LedgerStore, LedgerTransaction};

/// How candidate parents are matched against a requested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Walk every intersecting record with remaining balance in ascending
    /// `range.from` order, splitting across parents as needed.
    AscendingSerial,
    /// Use the single most recently issued record whose range fully
    /// contains the target.
    LatestIssued,
}

/// A request to consume `quantity` serials out of `range` against the
/// records of `identity` at `parent_tier`.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub parent_tier: Tier,
    pub identity: RecordIdentity,
    pub range: SerialRange,
    pub quantity: u64,
    pub units_per_case: u64,
    pub policy: MatchPolicy,
    pub consumer: ConsumerRef,
    pub requested_at: DateTime<Utc>,
}

/// Committed result of a successful allocation.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    /// One child per parent the request was split across, in ascending
    /// serial order.
    pub children: Vec<ChildConsumptionRecord>,
    /// The touched parents with their post-allocation balances, for the
    /// caller to recompute tier-aggregate figures.
    pub parents: Vec<LedgerRecord>,
}

/// Input for registering a bulk issuance grant.
#[derive(Debug, Clone)]
pub struct NewIssuance {
    pub company: CompanyId,
    pub market: Market,
    pub pack: PackId,
    pub prefix: LabelPrefix,
    pub range: SerialRange,
    pub issued_quantity: u64,
    pub units_per_case: u64,
    pub date_issued: DateTime<Utc>,
}

/// Input for recording production that consumed part of an issuance.
#[derive(Debug, Clone)]
pub struct NewUsage {
    pub company: CompanyId,
    pub market: Market,
    pub item: ItemId,
    pub pack: PackId,
    pub prefix: LabelPrefix,
    pub range: SerialRange,
    pub used_quantity: u64,
    pub used_quantity_in_cases: u64,
    pub units_per_case: u64,
    pub date_used: DateTime<Utc>,
}

/// Committed result of [`AllocationEngine::record_usage`].
#[derive(Debug, Clone)]
pub struct UsageRecorded {
    pub usage: LedgerRecord,
    pub consumption: ChildConsumptionRecord,
    pub issuance: LedgerRecord,
}

/// Everything the ledger knows about one serial number.
#[derive(Debug, Clone, Default)]
pub struct SerialTrace {
    pub issuances: Vec<LedgerRecord>,
    pub usages: Vec<LedgerRecord>,
    pub dispatch_links: Vec<ChildConsumptionRecord>,
}

/// The serial-range allocation engine.
///
/// Every operation runs under the coordinator's transaction scope: it
/// either commits all of its reads-checks-writes as one unit or leaves no
/// trace. There is no partial success visible outside a single call.
#[derive(Debug)]
pub struct AllocationEngine<S> {
    coordinator: TransactionCoordinator<S>,
}

impl<S: LedgerStore> AllocationEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(store),
        }
    }

    pub fn with_coordinator(coordinator: TransactionCoordinator<S>) -> Self {
        Self { coordinator }
    }

    /// Register a bulk issuance grant as a fresh Issuance-tier record.
    ///
    /// Rejects quantity/range mismatches, non-case-exact grants, future
    /// issue dates, and any overlap with an existing issuance of the same
    /// identity (regardless of that issuance's remaining balance).
    pub fn register_issuance(&self, new: &NewIssuance) -> LedgerResult<LedgerRecord> {
        if new.issued_quantity != new.range.size() {
            return Err(LedgerError::validation(
                "issued quantity and the serial range are not matching",
            ));
        }
        if new.date_issued > Utc::now() {
            return Err(LedgerError::validation("issue date cannot be in the future"));
        }

        let identity = RecordIdentity {
            company: new.company,
            market: new.market,
            scope: IdentityScope::Pack(new.pack),
            prefix: new.prefix,
        };
        let record = LedgerRecord::new(
            RecordId::new(),
            Tier::Issuance,
            identity,
            new.range,
            new.date_issued,
            new.units_per_case,
        )?;

        self.coordinator.run(|tx| {
            let overlapping = tx.find_overlapping(Tier::Issuance, &identity, new.range)?;
            if let Some(existing) = overlapping.first() {
                return Err(LedgerError::OverlapConflict {
                    requested: new.range,
                    existing: existing.range(),
                    record: existing.id().to_string(),
                });
            }
            tx.put_record(record.clone())?;
            Ok(record.clone())
        })
    }

    /// Consume `request.quantity` serials from the parent tier and commit
    /// the resulting child records plus updated parent balances as one unit.
    pub fn allocate(&self, request: &AllocationRequest) -> LedgerResult<AllocationOutcome> {
        validate_request(request)?;
        let outcome = self
            .coordinator
            .run(|tx| allocate_in_tx(tx, request))?;
        tracing::debug!(
            parents = outcome.parents.len(),
            quantity = request.quantity,
            range = %request.range,
            "allocation committed"
        );
        Ok(outcome)
    }

    /// Reverse every allocation made on behalf of `consumer`: release each
    /// child's segment on its parent, restore balances, delete the child.
    ///
    /// All-or-nothing across the batch; a missing segment (double reversal
    /// or tampered state) aborts the whole call.
    pub fn reverse(&self, consumer: &ConsumerRef) -> LedgerResult<Vec<ChildConsumptionRecord>> {
        let reversed = self.coordinator.run(|tx| {
            let children = tx.children_of(consumer)?;
            if children.is_empty() {
                return Err(LedgerError::not_found(
                    "no consumption records exist for the reversal target",
                ));
            }
            reverse_children_in_tx(tx, &children)?;
            Ok(children)
        })?;
        tracing::debug!(children = reversed.len(), "reversal committed");
        Ok(reversed)
    }

    /// Record production against the issuance ledger.
    ///
    /// Matching uses the single-parent `LatestIssued` policy the paper
    /// process follows: production reports a range out of one grant.
    pub fn record_usage(&self, new: &NewUsage) -> LedgerResult<UsageRecorded> {
        validate_usage(new)?;

        let issuance_identity = RecordIdentity {
            company: new.company,
            market: new.market,
            scope: IdentityScope::Pack(new.pack),
            prefix: new.prefix,
        };
        let usage_identity = RecordIdentity {
            company: new.company,
            market: new.market,
            scope: IdentityScope::Item(new.item),
            prefix: new.prefix,
        };

        let usage_id = RecordId::new();
        let request = AllocationRequest {
            parent_tier: Tier::Issuance,
            identity: issuance_identity,
            range: new.range,
            quantity: new.used_quantity,
            units_per_case: new.units_per_case,
            policy: MatchPolicy::LatestIssued,
            consumer: ConsumerRef::Usage { usage_id },
            requested_at: new.date_used,
        };
        validate_request(&request)?;

        self.coordinator.run(|tx| {
            let outcome = allocate_in_tx(tx, &request)?;

            let usage = LedgerRecord::new(
                usage_id,
                Tier::Usage,
                usage_identity,
                new.range,
                new.date_used,
                new.units_per_case,
            )?;
            tx.put_record(usage.clone())?;

            // Single-parent policy: exactly one child, one touched issuance.
            let consumption = outcome.children[0].clone();
            let issuance = outcome.parents[0].clone();
            Ok(UsageRecorded {
                usage,
                consumption,
                issuance,
            })
        })
    }

    /// Reverse a usage registration, restoring the issuance it consumed
    /// and deleting the emptied usage record.
    ///
    /// Refused while the usage still has consumed segments: dispatch links
    /// must be unlinked first.
    pub fn reverse_usage(&self, usage_id: RecordId) -> LedgerResult<LedgerRecord> {
        self.coordinator.run(|tx| {
            let usage = tx.load_record(Tier::Usage, usage_id)?;
            if !usage.is_fully_unconsumed() {
                return Err(LedgerError::validation(
                    "usage still has linked dispatch ranges; unlink them first",
                ));
            }

            let children = tx.children_of(&ConsumerRef::Usage { usage_id })?;
            if children.is_empty() {
                return Err(LedgerError::not_found(
                    "no consumption records exist for the reversal target",
                ));
            }
            reverse_children_in_tx(tx, &children)?;
            tx.delete_record(Tier::Usage, usage_id)?;
            Ok(usage)
        })
    }

    /// Everything the ledger knows about one printed serial: the grants,
    /// production records and dispatch links whose range contains it.
    pub fn trace_serial(&self, prefix: LabelPrefix, serial: u64) -> LedgerResult<SerialTrace> {
        self.coordinator.read(|tx| {
            let issuances = tx.records_containing(Tier::Issuance, prefix, serial)?;
            let usages = tx.records_containing(Tier::Usage, prefix, serial)?;
            let dispatch_links = tx
                .children_containing(prefix, serial)?
                .into_iter()
                .filter(|c| matches!(c.consumer, ConsumerRef::DispatchLink { .. }))
                .collect();
            Ok(SerialTrace {
                issuances,
                usages,
                dispatch_links,
            })
        })
    }
}

fn validate_request(request: &AllocationRequest) -> LedgerResult<()> {
    if request.quantity == 0 {
        return Err(LedgerError::validation("requested quantity must be positive"));
    }
    if request.quantity > request.range.size() {
        return Err(LedgerError::validation(format!(
            "requested quantity ({}) exceeds the target range size ({})",
            request.quantity,
            request.range.size()
        )));
    }
    // Consumption is reported in whole cases; never silently round.
    exact_cases(request.quantity, request.units_per_case)?;
    Ok(())
}

fn validate_usage(new: &NewUsage) -> LedgerResult<()> {
    if new.used_quantity == 0 || new.used_quantity != new.range.size() {
        return Err(LedgerError::validation(
            "used quantity and the serial range are not matching",
        ));
    }
    if new.units_per_case == 0 {
        return Err(LedgerError::validation("units per case must be positive"));
    }
    // Production consumes whole cases off the roll: both boundaries must
    // sit on case edges, not just the count.
    if (new.range.from() - 1) % new.units_per_case != 0
        || new.range.to() % new.units_per_case != 0
    {
        return Err(LedgerError::validation(
            "serial range boundaries are not aligned to whole cases",
        ));
    }
    let cases = exact_cases(new.used_quantity, new.units_per_case)?;
    if new.used_quantity_in_cases != cases || cases == 0 {
        return Err(LedgerError::validation(
            "declared case count does not match the produced quantity",
        ));
    }
    Ok(())
}

/// The greedy walk. Runs entirely inside one transaction; any error
/// aborts the transaction and with it every reservation made so far.
fn allocate_in_tx<Tx: LedgerTransaction>(
    tx: &mut Tx,
    request: &AllocationRequest,
) -> LedgerResult<AllocationOutcome> {
    let candidates = match request.policy {
        MatchPolicy::AscendingSerial => {
            tx.find_candidates(request.parent_tier, &request.identity, request.range)?
        }
        MatchPolicy::LatestIssued => tx
            .latest_covering(request.parent_tier, &request.identity, request.range)?
            .into_iter()
            .collect(),
    };
    if candidates.is_empty() {
        return Err(LedgerError::NoCapacity);
    }

    let mut remaining = request.quantity;
    let mut current_from = request.range.from();
    let mut children = Vec::new();
    let mut parents = Vec::new();

    for mut candidate in candidates {
        if remaining == 0 {
            break;
        }
        if current_from > request.range.to() {
            break;
        }
        let window = SerialRange::new(current_from, request.range.to())?;
        let Some(overlap) = window.intersect(&candidate.range()) else {
            continue;
        };

        let count = overlap.size().min(remaining);
        let segment_range = SerialRange::new(overlap.from(), overlap.from() + count - 1)?;

        // Overlap with previously consumed segments aborts the whole
        // allocation; `reserve` performs that check.
        candidate.reserve(ConsumedSegment::new(segment_range))?;

        let child = ChildConsumptionRecord::new(
            request.parent_tier,
            candidate.id(),
            segment_range,
            request.consumer,
            request.requested_at,
        );
        tx.put_record(candidate.clone())?;
        tx.create_child(child.clone())?;

        children.push(child);
        parents.push(candidate);
        remaining -= count;
        current_from = segment_range.to() + 1;
    }

    if remaining > 0 {
        return Err(LedgerError::IncompleteAllocation { remaining });
    }

    Ok(AllocationOutcome { children, parents })
}

fn reverse_children_in_tx<Tx: LedgerTransaction>(
    tx: &mut Tx,
    children: &[ChildConsumptionRecord],
) -> LedgerResult<()> {
    for child in children {
        let mut parent = tx.load_record(child.parent_tier, child.parent_id)?;
        parent.release(child.range)?;
        tx.put_record(parent)?;
        tx.delete_child(child.id)?;
    }
    Ok(())
}
