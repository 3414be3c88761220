//! Transfer Error Types

use std::time::Duration;
use thiserror::Error;

use crate::ledger::StoreError;

/// Unit-of-work failure
///
/// A rollback failure never hides the failure that triggered the rollback:
/// both are carried in [`TxError::Rollback`].
#[derive(Error, Debug)]
pub enum TxError {
    #[error("begin transaction: {0}")]
    Begin(#[source] StoreError),

    #[error(transparent)]
    Aborted(StoreError),

    #[error("unit of work exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("tx err: {cause}; rb err: {rollback}")]
    Rollback {
        cause: Box<TxError>,
        rollback: StoreError,
    },

    #[error("commit transaction: {0}")]
    Commit(#[source] StoreError),
}

impl TxError {
    /// Store failure that caused the unit of work to fail, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            TxError::Begin(e) | TxError::Aborted(e) | TxError::Commit(e) => Some(e),
            TxError::Rollback { cause, .. } => cause.store_error(),
            TxError::DeadlineExceeded(_) => None,
        }
    }

    /// True when the deadline expired, including when the rollback after it failed too
    pub fn is_deadline_exceeded(&self) -> bool {
        match self {
            TxError::DeadlineExceeded(_) => true,
            TxError::Rollback { cause, .. } => cause.is_deadline_exceeded(),
            _ => false,
        }
    }

    /// True when the outcome of the unit of work is unknown to the caller
    pub fn is_commit_failure(&self) -> bool {
        matches!(self, TxError::Commit(_))
    }
}

/// Transfer error types
#[derive(Error, Debug)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and destination account cannot be the same")]
    SameAccount,

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    // === Account Errors ===
    #[error("Account {0} not found")]
    AccountNotFound(i64),

    #[error("Account [{account_id}] currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        actual: String,
        expected: String,
    },

    #[error("Account {0} doesn't belong to the authenticated user")]
    Forbidden(i64),

    #[error("Transfer {0} not found")]
    TransferNotFound(i64),

    // === System Errors ===
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transfer failed: {0}")]
    UnitOfWork(#[from] TxError),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            TransferError::Forbidden(_) => "FORBIDDEN",
            TransferError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            TransferError::Store(_) => "DATABASE_ERROR",
            TransferError::UnitOfWork(e) => match e.store_error() {
                Some(StoreError::InsufficientFunds { .. }) => "INSUFFICIENT_BALANCE",
                Some(StoreError::NotFound { .. }) => "ACCOUNT_NOT_FOUND",
                Some(s) if s.is_retryable() => "CONFLICT",
                _ if e.is_deadline_exceeded() => "TIMEOUT",
                _ => "TRANSFER_FAILED",
            },
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self.code() {
            "INVALID_AMOUNT" | "SAME_ACCOUNT" | "UNSUPPORTED_CURRENCY" | "CURRENCY_MISMATCH" => 400,
            "FORBIDDEN" => 401,
            "ACCOUNT_NOT_FOUND" | "TRANSFER_NOT_FOUND" => 404,
            "CONFLICT" => 409,
            "INSUFFICIENT_BALANCE" => 422,
            "TIMEOUT" => 504,
            _ => 500,
        }
    }

    /// Whether resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::UnitOfWork(e) => {
                e.is_deadline_exceeded() || e.store_error().is_some_and(StoreError::is_retryable)
            }
            TransferError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
