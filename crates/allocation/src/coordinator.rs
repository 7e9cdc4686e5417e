//! Scoped transaction execution with bounded conflict retry.

use ealtrace_core::{LedgerError, LedgerResult};

use crate::store::{LedgerStore, LedgerTransaction};

/// Default number of attempts for an operation that keeps hitting
/// transaction conflicts.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Wraps a unit of work so that all reads, overlap checks, and writes of
/// one allocation or reversal commit atomically or not at all.
///
/// On `StoreConflict` the whole closure re-runs against a fresh snapshot,
/// up to the attempt budget. Any other error aborts immediately; the
/// uncommitted transaction is dropped and nothing becomes visible.
#[derive(Debug)]
pub struct TransactionCoordinator<S> {
    store: S,
    max_attempts: u32,
}

impl<S: LedgerStore> TransactionCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(store: S, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run `op` inside one committed transaction scope.
    ///
    /// The closure may run more than once; it must not carry side effects
    /// outside the transaction it is given.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(&mut S::Tx<'_>) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let mut attempt = 1;
        loop {
            let mut tx = self.store.begin()?;
            let value = op(&mut tx)?;
            match tx.commit() {
                Ok(()) => return Ok(value),
                Err(LedgerError::StoreConflict) if attempt < self.max_attempts => {
                    tracing::warn!(attempt, "ledger transaction conflicted, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run a read-only `op` against one snapshot; nothing is committed.
    pub fn read<T>(&self, op: impl FnOnce(&S::Tx<'_>) -> LedgerResult<T>) -> LedgerResult<T> {
        let tx = self.store.begin()?;
        op(&tx)
    }
}
