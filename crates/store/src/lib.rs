//! Infrastructure layer: reference store backend and reference data.
//!
//! The in-memory backend here is the reference implementation of the
//! `ealtrace-allocation` store contract: snapshot reads, atomic installs,
//! optimistic conflict detection. Production deployments can substitute
//! any backend with an equivalent scoped-transaction abstraction.

pub mod memory;
pub mod reference;

pub use memory::InMemoryLedgerStore;
pub use reference::InMemoryReferenceData;
