use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ealtrace_core::{
    ChildRecordId, DispatchId, ItemId, LabelPrefix, LedgerError, RecordId, SerialRange,
};

use crate::record::{exact_cases, Tier};

/// Who consumed a parent segment: the durable back-reference used to find
/// and reverse an allocation later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumerRef {
    /// A Usage-tier record consuming an Issuance.
    Usage { usage_id: RecordId },
    /// A dispatch-item link consuming a Usage.
    ///
    /// `link_range` is the full range the caller linked, not the sub-range
    /// allocated on this particular parent; a link split across several
    /// parents shares one `link_range`, so unlinking finds every piece.
    DispatchLink {
        dispatch: DispatchId,
        item: ItemId,
        prefix: LabelPrefix,
        link_range: SerialRange,
    },
}

/// Durable evidence of one allocation against one parent ledger record.
///
/// Owned by the allocation that created it; deleted on reversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildConsumptionRecord {
    pub id: ChildRecordId,
    pub parent_tier: Tier,
    pub parent_id: RecordId,
    pub range: SerialRange,
    pub quantity: u64,
    pub consumer: ConsumerRef,
    pub created_at: DateTime<Utc>,
}

impl ChildConsumptionRecord {
    pub fn new(
        parent_tier: Tier,
        parent_id: RecordId,
        range: SerialRange,
        consumer: ConsumerRef,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ChildRecordId::new(),
            parent_tier,
            parent_id,
            range,
            quantity: range.size(),
            consumer,
            created_at,
        }
    }

    /// Case-equivalent of this child's quantity, derived by exact division.
    pub fn quantity_in_cases(&self, units_per_case: u64) -> Result<u64, LedgerError> {
        exact_cases(self.quantity, units_per_case)
    }
}
