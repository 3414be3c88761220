//! Transfer request and result types

use serde::{Deserialize, Serialize};

use crate::ledger::{Account, Entry, Transfer};

/// Engine input, valid once the account guard has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Everything one transfer wrote, as committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Transfer request as submitted by an authenticated principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub principal: String,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
}

impl TransferRequest {
    pub fn new(
        principal: impl Into<String>,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            from_account_id,
            to_account_id,
            amount,
            currency: currency.into(),
        }
    }
}
