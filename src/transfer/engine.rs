//! Transfer orchestrator
//!
//! One transfer is one unit of work:
//!
//! ```text
//! transfer row → debit entry → credit entry → balance updates (lower id first)
//! ```
//!
//! Balance updates take row locks. Applying them in ascending account id
//! order, whatever the transfer direction, means two concurrent transfers
//! over the same pair of accounts always lock in the same order and cannot
//! deadlock each other.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::error::TransferError;
use super::executor::TxExecutor;
use super::types::{TransferTxParams, TransferTxResult};
use crate::ledger::{
    AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Ledger, Store,
};

/// Order in which the two balance adjustments of a transfer are applied.
///
/// Returns `(account_id, delta)` pairs, lower account id first.
pub fn adjustment_order(params: &TransferTxParams) -> [(i64, i64); 2] {
    let debit = (params.from_account_id, -params.amount);
    let credit = (params.to_account_id, params.amount);
    if params.from_account_id < params.to_account_id {
        [debit, credit]
    } else {
        [credit, debit]
    }
}

/// Executes funds transfers as single units of work
#[derive(Clone)]
pub struct TransferEngine {
    executor: TxExecutor,
    allow_overdraft: bool,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            executor: TxExecutor::new(store),
            allow_overdraft: false,
        }
    }

    /// Let the source balance go below zero instead of failing the transfer
    pub fn allow_overdraft(mut self, allow: bool) -> Self {
        self.allow_overdraft = allow;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.executor = self.executor.with_deadline(deadline);
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        self.executor.store()
    }

    /// Move `amount` from one account to another.
    ///
    /// Assumes the account guard has passed. Either every row of the transfer
    /// is committed, or none is.
    pub async fn transfer_funds(
        &self,
        params: TransferTxParams,
    ) -> Result<TransferTxResult, TransferError> {
        if params.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }
        if params.from_account_id == params.to_account_id {
            return Err(TransferError::SameAccount);
        }

        let allow_overdraft = self.allow_overdraft;
        let result = self
            .executor
            .exec_tx(move |q| Box::pin(async move { run_transfer(q, params, allow_overdraft).await }))
            .await?;

        info!(
            transfer_id = result.transfer.id,
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount,
            "Transfer committed"
        );
        Ok(result)
    }
}

async fn run_transfer(
    q: &mut dyn Ledger,
    params: TransferTxParams,
    allow_overdraft: bool,
) -> Result<TransferTxResult, crate::ledger::StoreError> {
    let transfer = q
        .create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let from_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await?;

    let to_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let [first, second] = adjustment_order(&params);
    let first = add_balance(q, first, allow_overdraft).await?;
    let second = add_balance(q, second, allow_overdraft).await?;
    let (from_account, to_account) = if first.id == params.from_account_id {
        (first, second)
    } else {
        (second, first)
    };

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

async fn add_balance(
    q: &mut dyn Ledger,
    (id, amount): (i64, i64),
    allow_overdraft: bool,
) -> Result<crate::ledger::Account, crate::ledger::StoreError> {
    q.add_account_balance(AddAccountBalanceParams {
        id,
        amount,
        // Credits never need the floor check.
        enforce_non_negative: amount < 0 && !allow_overdraft,
    })
    .await
}
