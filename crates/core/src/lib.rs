//! `ealtrace-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the serial-range value object, label metadata,
//! and the error taxonomy shared by every tier of the EAL ledger.

pub mod error;
pub mod id;
pub mod label;
pub mod range;

pub use error::{LedgerError, LedgerResult};
pub use id::{ChildRecordId, CompanyId, DeliveryId, DispatchId, ItemId, PackId, RecordId};
pub use label::{LabelPrefix, Market};
pub use range::{SerialRange, MAX_SERIAL};
