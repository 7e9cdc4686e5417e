//! In-memory reference-data lookups (item pack configuration).

use std::collections::HashMap;
use std::sync::RwLock;

use ealtrace_allocation::ReferenceData;
use ealtrace_core::{ItemId, LedgerError, LedgerResult};

/// In-memory `ReferenceData`: item → units per case.
#[derive(Debug, Default)]
pub struct InMemoryReferenceData {
    items: RwLock<HashMap<ItemId, u64>>,
}

impl InMemoryReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&self, item: ItemId, units_per_case: u64) {
        if let Ok(mut items) = self.items.write() {
            items.insert(item, units_per_case);
        }
    }
}

impl ReferenceData for InMemoryReferenceData {
    fn units_per_case(&self, item: ItemId) -> LedgerResult<u64> {
        let items = self
            .items
            .read()
            .map_err(|_| LedgerError::store("lock poisoned"))?;
        items
            .get(&item)
            .copied()
            .ok_or_else(|| LedgerError::not_found(format!("item {item}")))
    }
}
