#![forbid(unsafe_code)]

use super::{StoreError, StoreHooks};
use rusqlite::{Connection, Transaction};
use tracing::debug;

/// One logical unit of work: the outer transaction plus the hooks every
/// operation inside it reports to. Nested scopes are SQLite savepoints.
pub struct UnitOfWork<'s> {
    tx: Transaction<'s>,
    hooks: &'s StoreHooks,
}

impl<'s> UnitOfWork<'s> {
    pub(in crate::store) fn new(tx: Transaction<'s>, hooks: &'s StoreHooks) -> Self {
        Self { tx, hooks }
    }

    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    pub fn hooks(&self) -> &'s StoreHooks {
        self.hooks
    }

    /// Runs `f` inside a savepoint. `Ok` releases it into the outer
    /// transaction; `Err` rolls back only the savepoint's writes.
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&Connection, &StoreHooks) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let hooks = self.hooks;
        let savepoint = self.tx.savepoint()?;
        match f(&*savepoint, hooks) {
            Ok(value) => {
                savepoint.commit()?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "nested scope rolled back");
                Err(err)
            }
        }
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback()?;
        Ok(())
    }
}

impl std::fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork").finish_non_exhaustive()
    }
}
