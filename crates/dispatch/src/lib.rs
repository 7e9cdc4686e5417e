//! Dispatch domain module.
//!
//! The outbound shipment aggregate and the tracker that links consumed EAL
//! ranges to its line items, enforcing the per-item case cap before
//! delegating to the allocation engine.

pub mod dispatch;
pub mod tracker;

pub use dispatch::{Dispatch, DispatchItem, DispatchStatus, EalLink, VehicleDetails};
pub use tracker::DispatchLinkTracker;
