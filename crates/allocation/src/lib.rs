//! Allocation engine for the EAL serial-range ledger.
//!
//! This crate holds the greedy multi-parent allocation algorithm, its
//! symmetric reversal, and the transaction boundary they run under. It
//! makes no storage assumptions: backends implement the traits in
//! [`store`] and must provide snapshot isolation for the lifetime of one
//! transaction (see `ealtrace-store` for the reference implementation).

pub mod coordinator;
pub mod engine;
pub mod store;

pub use coordinator::TransactionCoordinator;
pub use engine::{
    AllocationEngine, AllocationOutcome, AllocationRequest, MatchPolicy, NewIssuance, NewUsage,
    SerialTrace, UsageRecorded,
};
pub use store::{LedgerStore, LedgerTransaction, ReferenceData};
