use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ealtrace_core::{
    CompanyId, DeliveryId, DispatchId, ItemId, LabelPrefix, LedgerError, LedgerResult, Market,
    SerialRange,
};
use ealtrace_allocation::ReferenceData;
use ealtrace_ledger::exact_cases;

/// Dispatch status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Draft,
    Final,
    Loaded,
    Dispatched,
    Delivered,
}

/// Vehicle/driver details captured when the load leaves the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDetails {
    pub vehicle_number: String,
    pub driver_name: String,
    pub driver_contact: String,
}

/// One EAL range linked to a dispatch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EalLink {
    pub prefix: LabelPrefix,
    pub range: SerialRange,
}

/// One line item of a dispatch: the item, its dispatched case count (the
/// cap), and the EAL ranges linked against it so far.
///
/// Invariant: the case-equivalent of all linked ranges never exceeds
/// `quantity_in_cases`. The linked figure is derived from the link list on
/// every read, so the two can never drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchItem {
    item: ItemId,
    quantity_in_cases: u64,
    eal_links: Vec<EalLink>,
}

impl DispatchItem {
    pub fn new(item: ItemId, quantity_in_cases: u64) -> LedgerResult<Self> {
        if quantity_in_cases == 0 {
            return Err(LedgerError::validation(
                "dispatch item quantity must be positive",
            ));
        }
        Ok(Self {
            item,
            quantity_in_cases,
            eal_links: Vec::new(),
        })
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn quantity_in_cases(&self) -> u64 {
        self.quantity_in_cases
    }

    pub fn eal_links(&self) -> &[EalLink] {
        &self.eal_links
    }

    /// Case-equivalent of every linked range. Each link was validated
    /// case-exact when it was made, so the sum is a sum of integers.
    pub fn eal_issued_quantity(&self, units_per_case: u64) -> LedgerResult<u64> {
        let mut total = 0u64;
        for link in &self.eal_links {
            total += exact_cases(link.range.size(), units_per_case)?;
        }
        Ok(total)
    }

    pub fn has_link(&self, prefix: LabelPrefix, range: SerialRange) -> bool {
        self.eal_links
            .iter()
            .any(|l| l.prefix == prefix && l.range == range)
    }

    pub(crate) fn push_link(&mut self, link: EalLink) {
        self.eal_links.push(link);
    }

    pub(crate) fn remove_link(
        &mut self,
        prefix: LabelPrefix,
        range: SerialRange,
    ) -> LedgerResult<EalLink> {
        let pos = self
            .eal_links
            .iter()
            .position(|l| l.prefix == prefix && l.range == range)
            .ok_or(LedgerError::LinkNotFound)?;
        Ok(self.eal_links.remove(pos))
    }
}

/// Aggregate root: an outbound shipment owning its line items and their
/// EAL links exclusively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    id: DispatchId,
    company: CompanyId,
    market: Market,
    dispatched_at: DateTime<Utc>,
    delivery_to: DeliveryId,
    items: Vec<DispatchItem>,
    total_quantity: u64,
    status: DispatchStatus,
    vehicle: Option<VehicleDetails>,
}

impl Dispatch {
    pub fn new(
        id: DispatchId,
        company: CompanyId,
        market: Market,
        dispatched_at: DateTime<Utc>,
        delivery_to: DeliveryId,
        items: Vec<DispatchItem>,
        total_quantity: u64,
    ) -> LedgerResult<Self> {
        if items.is_empty() {
            return Err(LedgerError::validation("dispatch needs at least one item"));
        }
        Ok(Self {
            id,
            company,
            market,
            dispatched_at,
            delivery_to,
            items,
            total_quantity,
            status: DispatchStatus::Draft,
            vehicle: None,
        })
    }

    pub fn id(&self) -> DispatchId {
        self.id
    }

    pub fn company(&self) -> CompanyId {
        self.company
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn dispatched_at(&self) -> DateTime<Utc> {
        self.dispatched_at
    }

    pub fn delivery_to(&self) -> DeliveryId {
        self.delivery_to
    }

    pub fn items(&self) -> &[DispatchItem] {
        &self.items
    }

    pub fn total_quantity(&self) -> u64 {
        self.total_quantity
    }

    pub fn status(&self) -> DispatchStatus {
        self.status
    }

    pub fn vehicle(&self) -> Option<&VehicleDetails> {
        self.vehicle.as_ref()
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, DispatchStatus::Draft)
    }

    pub fn item(&self, item_id: ItemId) -> Option<&DispatchItem> {
        self.items.iter().find(|i| i.item == item_id)
    }

    pub(crate) fn item_mut(&mut self, item_id: ItemId) -> Option<&mut DispatchItem> {
        self.items.iter_mut().find(|i| i.item == item_id)
    }

    /// Replace the line items; only Draft dispatches may be edited.
    pub fn replace_items(
        &mut self,
        items: Vec<DispatchItem>,
        total_quantity: u64,
    ) -> LedgerResult<()> {
        if !self.is_modifiable() {
            return Err(LedgerError::validation(
                "only draft dispatches can be updated",
            ));
        }
        if items.is_empty() {
            return Err(LedgerError::validation("dispatch needs at least one item"));
        }
        self.items = items;
        self.total_quantity = total_quantity;
        Ok(())
    }

    pub fn set_status(&mut self, status: DispatchStatus) {
        self.status = status;
    }

    pub fn set_vehicle_details(&mut self, vehicle: VehicleDetails, status: DispatchStatus) {
        self.vehicle = Some(vehicle);
        self.status = status;
    }

    /// Sum of every item's linked case-equivalent: the dispatch-level
    /// `EAL issued` total, derived on read.
    pub fn eal_issued_total_quantity<R: ReferenceData>(&self, reference: &R) -> LedgerResult<u64> {
        let mut total = 0u64;
        for item in &self.items {
            let upc = reference.units_per_case(item.item)?;
            total += item.eal_issued_quantity(upc)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_item(quantity_in_cases: u64) -> DispatchItem {
        DispatchItem::new(ItemId::new(), quantity_in_cases).unwrap()
    }

    fn test_dispatch(items: Vec<DispatchItem>) -> Dispatch {
        Dispatch::new(
            DispatchId::new(),
            CompanyId::new(),
            Market::Local,
            Utc::now(),
            DeliveryId::new(),
            items,
            100,
        )
        .unwrap()
    }

    fn link(from: u64, to: u64) -> EalLink {
        EalLink {
            prefix: LabelPrefix::parse("EAL").unwrap(),
            range: SerialRange::new(from, to).unwrap(),
        }
    }

    #[test]
    fn new_dispatch_starts_as_draft() {
        let dispatch = test_dispatch(vec![test_item(10)]);
        assert_eq!(dispatch.status(), DispatchStatus::Draft);
        assert!(dispatch.is_modifiable());
        assert!(dispatch.vehicle().is_none());
    }

    #[test]
    fn dispatch_requires_items() {
        let err = Dispatch::new(
            DispatchId::new(),
            CompanyId::new(),
            Market::Local,
            Utc::now(),
            DeliveryId::new(),
            vec![],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn replace_items_rejected_once_finalized() {
        let mut dispatch = test_dispatch(vec![test_item(10)]);
        dispatch.set_status(DispatchStatus::Final);
        let err = dispatch
            .replace_items(vec![test_item(5)], 50)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn eal_issued_quantity_sums_links_in_cases() {
        let mut item = test_item(20);
        item.push_link(link(1, 60));
        item.push_link(link(61, 100));
        assert_eq!(item.eal_issued_quantity(10).unwrap(), 10);
    }

    #[test]
    fn remove_link_requires_exact_match() {
        let mut item = test_item(20);
        item.push_link(link(1, 60));

        let err = item
            .remove_link(
                LabelPrefix::parse("EAL").unwrap(),
                SerialRange::new(1, 50).unwrap(),
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::LinkNotFound);

        item.remove_link(
            LabelPrefix::parse("EAL").unwrap(),
            SerialRange::new(1, 60).unwrap(),
        )
        .unwrap();
        assert!(item.eal_links().is_empty());
    }

    #[test]
    fn vehicle_details_update_status_together() {
        let mut dispatch = test_dispatch(vec![test_item(10)]);
        dispatch.set_vehicle_details(
            VehicleDetails {
                vehicle_number: "KA-01-1234".to_string(),
                driver_name: "R. Perera".to_string(),
                driver_contact: "0771234567".to_string(),
            },
            DispatchStatus::Loaded,
        );
        assert_eq!(dispatch.status(), DispatchStatus::Loaded);
        assert!(dispatch.vehicle().is_some());
    }
}
