//! Ledger store capabilities
//!
//! Two capability sets are exposed:
//! - [`Ledger`]: the single-row primitives available inside a unit of work
//! - [`Store`]: the full store surface, which opens units of work and also
//!   serves pool-level reads and administrative operations
//!
//! A [`UnitOfWork`] is a [`Ledger`] that can be committed or rolled back.
//! Writes made through it are invisible to other units of work until commit.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, Page, Transfer,
};

/// Store-level failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Insufficient funds in account {account_id}: balance {balance}, delta {delta}")]
    InsufficientFunds {
        account_id: i64,
        balance: i64,
        delta: i64,
    },

    #[error("Balance overflow on account {0}")]
    BalanceOverflow(i64),

    #[error("Lock wait timeout on account {0}")]
    LockTimeout(i64),

    #[error("Serialization conflict: {0}")]
    Conflict(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Injected failure at {0}")]
    Injected(&'static str),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn account_not_found(id: i64) -> Self {
        StoreError::NotFound {
            entity: "account",
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Contention failures; the whole request may be retried by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LockTimeout(_) | StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            let message = db.message().to_string();
            match db.code().as_deref() {
                Some("23505") => return StoreError::UniqueViolation(message),
                Some("23503") => return StoreError::ForeignKeyViolation(message),
                // serialization_failure, deadlock_detected, lock_not_available
                Some("40001") | Some("40P01") | Some("55P03") => {
                    return StoreError::Conflict(message);
                }
                _ => {}
            }
        }
        StoreError::Database(e)
    }
}

/// Single-row primitives executed inside a unit of work
#[async_trait]
pub trait Ledger: Send {
    async fn create_account(&mut self, params: CreateAccountParams)
    -> Result<Account, StoreError>;

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError>;

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError>;

    /// Atomically add a signed delta to an account balance and return the updated row.
    ///
    /// Takes the row lock, which is held until the unit of work ends.
    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>;
}

/// An open transaction against the store
#[async_trait]
pub trait UnitOfWork: Ledger {
    /// Primitive handle scoped to this transaction
    fn ledger(&mut self) -> &mut dyn Ledger;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Full store surface
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new unit of work
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    async fn get_account(&self, id: i64) -> Result<Account, StoreError>;

    async fn list_accounts(&self, owner: &str, page: Page) -> Result<Vec<Account>, StoreError>;

    /// Remove an account. Fails with `ForeignKeyViolation` while entries or
    /// transfers reference it.
    async fn delete_account(&self, id: i64) -> Result<(), StoreError>;

    async fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError>;

    /// Transfers where the account is either side, oldest first
    async fn list_transfers(&self, account_id: i64, page: Page)
    -> Result<Vec<Transfer>, StoreError>;

    async fn list_entries(&self, account_id: i64, page: Page) -> Result<Vec<Entry>, StoreError>;

    /// Insert an account in its own single-statement unit of work
    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let mut uow = self.begin().await?;
        match uow.create_account(params).await {
            Ok(account) => {
                uow.commit().await?;
                Ok(account)
            }
            Err(e) => {
                if let Err(rb) = uow.rollback().await {
                    tracing::warn!(error = %rb, "rollback after failed account insert failed");
                }
                Err(e)
            }
        }
    }
}
