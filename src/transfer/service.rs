//! Transfer service: guard + engine behind one entry point

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::engine::TransferEngine;
use super::error::TransferError;
use super::guard::AccountGuard;
use super::types::{TransferRequest, TransferTxResult};
use crate::ledger::{Store, StoreError, Transfer};

#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn Store>,
    guard: Arc<AccountGuard>,
    engine: TransferEngine,
}

impl TransferService {
    pub fn new(store: Arc<dyn Store>, allow_overdraft: bool, deadline: Option<Duration>) -> Self {
        let mut engine = TransferEngine::new(store.clone()).allow_overdraft(allow_overdraft);
        if let Some(deadline) = deadline {
            engine = engine.with_deadline(deadline);
        }
        Self {
            guard: Arc::new(AccountGuard::new(store.clone())),
            store,
            engine,
        }
    }

    /// Check the request, then move the funds in one unit of work
    pub async fn create_transfer(
        &self,
        req: TransferRequest,
    ) -> Result<TransferTxResult, TransferError> {
        let params = self.guard.check(&req).await?;

        match self.engine.transfer_funds(params).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(
                    principal = %req.principal,
                    from = params.from_account_id,
                    to = params.to_account_id,
                    amount = params.amount,
                    code = e.code(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Transfer failed"
                );
                Err(e)
            }
        }
    }

    /// Read a committed transfer. The principal must own one of its accounts.
    pub async fn get_transfer(&self, principal: &str, id: i64) -> Result<Transfer, TransferError> {
        let transfer = self.store.get_transfer(id).await.map_err(|e| match e {
            StoreError::NotFound { .. } => TransferError::TransferNotFound(id),
            other => TransferError::Store(other),
        })?;

        let from = self.store.get_account(transfer.from_account_id).await?;
        if from.owner == principal {
            return Ok(transfer);
        }
        let to = self.store.get_account(transfer.to_account_id).await?;
        if to.owner == principal {
            return Ok(transfer);
        }

        info!(principal, transfer_id = id, "Transfer read denied");
        Err(TransferError::Forbidden(transfer.from_account_id))
    }
}
