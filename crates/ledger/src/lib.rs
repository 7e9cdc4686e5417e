//! Ledger domain module.
//!
//! This crate contains the consumable serial-range record shared by the
//! Issuance and Usage tiers, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod child;
pub mod record;

pub use child::{ChildConsumptionRecord, ConsumerRef};
pub use record::{exact_cases, ConsumedSegment, IdentityScope, LedgerRecord, RecordIdentity, Tier};
