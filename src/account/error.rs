//! Account service errors

use thiserror::Error;

use crate::ledger::StoreError;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Owner must not be empty")]
    EmptyOwner,

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Invalid page: page_id {page_id} (min 1), page_size {page_size} ({min}-{max})")]
    InvalidPage {
        page_id: i64,
        page_size: i64,
        min: i64,
        max: i64,
    },

    #[error("Account {0} not found")]
    NotFound(i64),

    #[error("Account {0} doesn't belong to the authenticated user")]
    Forbidden(i64),

    #[error("{owner} already has a {currency} account")]
    AlreadyExists { owner: String, currency: String },

    #[error("Account {0} has ledger entries and cannot be deleted")]
    HasLedgerEntries(i64),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AccountError {
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::EmptyOwner => "INVALID_OWNER",
            AccountError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            AccountError::InvalidPage { .. } => "INVALID_PAGE",
            AccountError::NotFound(_) => "ACCOUNT_NOT_FOUND",
            AccountError::Forbidden(_) => "FORBIDDEN",
            AccountError::AlreadyExists { .. } => "ACCOUNT_EXISTS",
            AccountError::HasLedgerEntries(_) => "ACCOUNT_IN_USE",
            AccountError::Store(_) => "DATABASE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            AccountError::EmptyOwner
            | AccountError::UnsupportedCurrency(_)
            | AccountError::InvalidPage { .. } => 400,
            AccountError::Forbidden(_) => 401,
            AccountError::NotFound(_) => 404,
            AccountError::AlreadyExists { .. } | AccountError::HasLedgerEntries(_) => 409,
            AccountError::Store(_) => 500,
        }
    }
}
