//! Links consumed EAL ranges to dispatch line items.
//!
//! The tracker sits above the allocation engine for the Dispatch tier:
//! it adds the item-level case-cap check, then delegates the ledger work
//! to [`AllocationEngine`] and mirrors the committed result onto the
//! aggregate. The aggregate is only touched after the ledger transaction
//! has committed, so a failed call leaves both sides unchanged.

use ealtrace_allocation::{
    AllocationEngine, AllocationOutcome, AllocationRequest, LedgerStore, MatchPolicy,
    ReferenceData,
};
use ealtrace_core::{ItemId, LabelPrefix, LedgerError, LedgerResult, SerialRange};
use ealtrace_ledger::{
    exact_cases, ChildConsumptionRecord, ConsumerRef, IdentityScope, RecordIdentity, Tier,
};

use crate::dispatch::{Dispatch, EalLink};

/// Per-dispatch EAL link/unlink operations.
#[derive(Debug)]
pub struct DispatchLinkTracker<'a, S, R> {
    engine: &'a AllocationEngine<S>,
    reference: &'a R,
}

impl<'a, S: LedgerStore, R: ReferenceData> DispatchLinkTracker<'a, S, R> {
    pub fn new(engine: &'a AllocationEngine<S>, reference: &'a R) -> Self {
        Self { engine, reference }
    }

    /// Link `range` to one line item of `dispatch`.
    ///
    /// The range must convert exactly into cases, fit under the item's
    /// dispatched-quantity cap, and be fully covered by Usage-tier balance
    /// for the dispatch's company/market/item/prefix identity.
    pub fn link_range(
        &self,
        dispatch: &mut Dispatch,
        item_id: ItemId,
        prefix: LabelPrefix,
        range: SerialRange,
    ) -> LedgerResult<AllocationOutcome> {
        let units_per_case = self.reference.units_per_case(item_id)?;
        let item = dispatch
            .item(item_id)
            .ok_or_else(|| LedgerError::not_found("item not found in dispatch"))?;

        let new_cases = exact_cases(range.size(), units_per_case)?;
        let linked = item.eal_issued_quantity(units_per_case)?;
        if linked + new_cases > item.quantity_in_cases() {
            return Err(LedgerError::CapacityExceeded {
                cap: item.quantity_in_cases(),
                linked,
                requested: new_cases,
            });
        }

        let request = AllocationRequest {
            parent_tier: Tier::Usage,
            identity: RecordIdentity {
                company: dispatch.company(),
                market: dispatch.market(),
                scope: IdentityScope::Item(item_id),
                prefix,
            },
            range,
            quantity: range.size(),
            units_per_case,
            policy: MatchPolicy::AscendingSerial,
            consumer: ConsumerRef::DispatchLink {
                dispatch: dispatch.id(),
                item: item_id,
                prefix,
                link_range: range,
            },
            requested_at: dispatch.dispatched_at(),
        };
        let outcome = self.engine.allocate(&request)?;

        // Ledger committed; mirror the link onto the aggregate.
        let item = dispatch
            .item_mut(item_id)
            .ok_or_else(|| LedgerError::not_found("item not found in dispatch"))?;
        item.push_link(EalLink { prefix, range });
        tracing::debug!(
            dispatch = %dispatch.id(),
            %range,
            parents = outcome.parents.len(),
            "EAL range linked"
        );
        Ok(outcome)
    }

    /// Undo a previous [`link_range`](Self::link_range) call.
    ///
    /// Finds every child consumption record created for the link (however
    /// many parents it was split across), reverses them as one batch, then
    /// removes the link from the aggregate. Item and dispatch totals
    /// reconcile to their pre-link values.
    pub fn unlink_range(
        &self,
        dispatch: &mut Dispatch,
        item_id: ItemId,
        prefix: LabelPrefix,
        range: SerialRange,
    ) -> LedgerResult<Vec<ChildConsumptionRecord>> {
        let item = dispatch
            .item(item_id)
            .ok_or_else(|| LedgerError::not_found("item not found in dispatch"))?;
        if !item.has_link(prefix, range) {
            return Err(LedgerError::LinkNotFound);
        }

        let consumer = ConsumerRef::DispatchLink {
            dispatch: dispatch.id(),
            item: item_id,
            prefix,
            link_range: range,
        };
        let reversed = self.engine.reverse(&consumer)?;

        let item = dispatch
            .item_mut(item_id)
            .ok_or_else(|| LedgerError::not_found("item not found in dispatch"))?;
        item.remove_link(prefix, range)?;
        tracing::debug!(
            dispatch = %dispatch.id(),
            %range,
            children = reversed.len(),
            "EAL range unlinked"
        );
        Ok(reversed)
    }
}
