//! Statement-execution context and the transaction scope built on it.
//!
//! Every store operation receives a [`Transactor`]. A root transactor issues
//! statements straight against the pool; a bound transactor issues them inside
//! an open transaction. [`Transactor::within_transaction`] turns the former
//! into the latter for the duration of one unit of work and resolves the
//! transaction when the unit returns.
//!
//! Scopes do not nest. A unit of work started on a bound transactor runs
//! inline on the open transaction, so it has no rollback boundary of its own:
//! if it fails after earlier statements of the outer unit succeeded, those
//! statements stay staged until the outermost scope commits or rolls back.
//! Callers that need a nest of operations to be atomic must open the
//! outermost scope themselves and pass the bound transactor down.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[cfg(test)]
pub mod memory;
pub mod postgres;

/// A backing store that can open transactions.
#[async_trait]
pub trait Database: Clone + Send + Sync + 'static {
    type Tx: Send + 'static;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), sqlx::Error>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), sqlx::Error>;
}

enum Handle<Tx> {
    Root,
    Bound { tx: Tx, depth: usize },
}

/// The current execution context for issuing statements.
pub struct Transactor<D: Database> {
    db: D,
    handle: Handle<D::Tx>,
}

impl<D: Database> Transactor<D> {
    pub fn root(db: D) -> Self {
        Self {
            db,
            handle: Handle::Root,
        }
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.handle, Handle::Bound { .. })
    }

    /// Number of `within_transaction` calls currently running on this
    /// transaction; 0 for a root transactor.
    pub fn depth(&self) -> usize {
        match self.handle {
            Handle::Root => 0,
            Handle::Bound { depth, .. } => depth,
        }
    }

    fn enter(&mut self) {
        if let Handle::Bound { depth, .. } = &mut self.handle {
            *depth += 1;
        }
    }

    fn leave(&mut self) {
        if let Handle::Bound { depth, .. } = &mut self.handle {
            *depth = depth.saturating_sub(1);
        }
    }

    /// Runs `work` inside a transaction.
    ///
    /// On a root transactor this begins a transaction, hands `work` a bound
    /// transactor, commits when it returns `Ok` and rolls back when it returns
    /// `Err`. The error from `work` is returned unchanged unless the rollback
    /// also fails, in which case both are reported as
    /// [`Error::RollbackFailed`].
    ///
    /// On a bound transactor `work` runs inline against the open transaction
    /// and nothing is committed or rolled back here.
    pub async fn within_transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut Transactor<D>) -> BoxFuture<'s, Result<T>> + Send,
    {
        if self.in_transaction() {
            self.enter();
            debug!(depth = self.depth(), "joining open transaction");
            let res = work(&mut *self).await;
            self.leave();
            return res;
        }

        let tx = self
            .db
            .begin()
            .await
            .map_err(|e| Error::persistence("begin transaction", e))?;
        debug!("transaction started");

        let mut scoped = Transactor {
            db: self.db.clone(),
            handle: Handle::Bound { tx, depth: 1 },
        };
        let res = work(&mut scoped).await;

        // Only this module can rebind a handle, so the scope is still bound.
        let Handle::Bound { tx, .. } = scoped.handle else {
            return res;
        };

        match res {
            Ok(value) => {
                self.db
                    .commit(tx)
                    .await
                    .map_err(|e| Error::persistence("commit transaction", e))?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => match self.db.rollback(tx).await {
                Ok(()) => {
                    debug!(error = %err, "transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    warn!(error = %err, rollback_error = %rollback, "transaction rollback failed");
                    Err(Error::RollbackFailed {
                        cause: Box::new(err),
                        rollback,
                    })
                }
            },
        }
    }
}
