//! Unit-of-work executor
//!
//! Runs a closure against a transaction-scoped [`Ledger`] handle, then
//! commits on success or rolls back on failure. Nothing is retried here;
//! the caller decides whether to resubmit the whole request.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::TxError;
use crate::ledger::{Ledger, Store, StoreError};

/// Executes units of work against a [`Store`]
#[derive(Clone)]
pub struct TxExecutor {
    store: Arc<dyn Store>,
    deadline: Option<Duration>,
}

impl TxExecutor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            deadline: None,
        }
    }

    /// Bound how long the unit-of-work body may run before it is rolled back
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Run `f` inside one transaction.
    ///
    /// - begin failure: returned as [`TxError::Begin`], `f` is not called
    /// - `f` fails or the deadline elapses: rolled back; if the rollback also
    ///   fails both errors are returned in [`TxError::Rollback`]
    /// - commit failure: returned as [`TxError::Commit`]
    ///
    /// If the returned future is dropped mid-flight, dropping the unit of work
    /// discards its writes.
    pub async fn exec_tx<T, F>(&self, f: F) -> Result<T, TxError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut dyn Ledger) -> BoxFuture<'c, Result<T, StoreError>> + Send,
    {
        let mut uow = self.store.begin().await.map_err(TxError::Begin)?;

        let outcome = match self.deadline {
            Some(limit) => match tokio::time::timeout(limit, f(uow.ledger())).await {
                Ok(result) => result.map_err(TxError::Aborted),
                Err(_) => Err(TxError::DeadlineExceeded(limit)),
            },
            None => f(uow.ledger()).await.map_err(TxError::Aborted),
        };

        match outcome {
            Ok(value) => {
                uow.commit().await.map_err(TxError::Commit)?;
                Ok(value)
            }
            Err(cause) => {
                debug!(error = %cause, "unit of work failed, rolling back");
                match uow.rollback().await {
                    Ok(()) => Err(cause),
                    Err(rollback) => {
                        warn!(error = %cause, rollback_error = %rollback, "rollback failed");
                        Err(TxError::Rollback {
                            cause: Box::new(cause),
                            rollback,
                        })
                    }
                }
            }
        }
    }
}
