//! Account operations on behalf of an authenticated principal
//!
//! Accounts always open with a zero balance, so an account's balance equals
//! the sum of its entries from the moment it exists. Funds only arrive through
//! transfers.

use std::sync::Arc;
use tracing::info;

use super::error::AccountError;
use crate::ledger::{Account, CreateAccountParams, Currency, Entry, Page, Store, StoreError};

pub const MIN_PAGE_SIZE: i64 = 5;
pub const MAX_PAGE_SIZE: i64 = 10;

/// Validate a 1-based page request
pub fn page(page_id: i64, page_size: i64) -> Result<Page, AccountError> {
    let invalid = || AccountError::InvalidPage {
        page_id,
        page_size,
        min: MIN_PAGE_SIZE,
        max: MAX_PAGE_SIZE,
    };
    if page_id < 1 || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(invalid());
    }
    // Offsets past i64::MAX are rejected rather than wrapped.
    Page::checked(page_id, page_size).ok_or_else(invalid)
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn open_account(&self, owner: &str, currency: &str) -> Result<Account, AccountError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(AccountError::EmptyOwner);
        }
        let currency: Currency = currency
            .parse()
            .map_err(|_| AccountError::UnsupportedCurrency(currency.to_string()))?;

        let account = self
            .store
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                balance: 0,
                currency,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => AccountError::AlreadyExists {
                    owner: owner.to_string(),
                    currency: currency.to_string(),
                },
                other => AccountError::Store(other),
            })?;

        info!(account_id = account.id, owner, %currency, "Account opened");
        Ok(account)
    }

    /// Fetch an account owned by `owner`
    pub async fn get_account(&self, owner: &str, id: i64) -> Result<Account, AccountError> {
        let account = self.store.get_account(id).await.map_err(|e| match e {
            StoreError::NotFound { .. } => AccountError::NotFound(id),
            other => AccountError::Store(other),
        })?;
        if account.owner != owner {
            return Err(AccountError::Forbidden(id));
        }
        Ok(account)
    }

    pub async fn list_accounts(
        &self,
        owner: &str,
        page_id: i64,
        page_size: i64,
    ) -> Result<Vec<Account>, AccountError> {
        let page = page(page_id, page_size)?;
        Ok(self.store.list_accounts(owner, page).await?)
    }

    /// Delete an owned account that no ledger row references
    pub async fn delete_account(&self, owner: &str, id: i64) -> Result<(), AccountError> {
        self.get_account(owner, id).await?;

        self.store.delete_account(id).await.map_err(|e| match e {
            StoreError::ForeignKeyViolation(_) => AccountError::HasLedgerEntries(id),
            StoreError::NotFound { .. } => AccountError::NotFound(id),
            other => AccountError::Store(other),
        })?;

        info!(account_id = id, owner, "Account deleted");
        Ok(())
    }

    /// Ledger entries of an owned account, oldest first
    pub async fn account_entries(
        &self,
        owner: &str,
        id: i64,
        page_id: i64,
        page_size: i64,
    ) -> Result<Vec<Entry>, AccountError> {
        let page = page(page_id, page_size)?;
        self.get_account(owner, id).await?;
        Ok(self.store.list_entries(id, page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryStore;
    use crate::transfer::{TransferEngine, TransferTxParams};

    fn service() -> (MemoryStore, AccountService) {
        let store = MemoryStore::new();
        let service = AccountService::new(Arc::new(store.clone()));
        (store, service)
    }

    #[tokio::test]
    async fn test_open_account_starts_at_zero() {
        let (_, service) = service();

        let account = service.open_account("alice", "USD").await.unwrap();

        assert_eq!(account.owner, "alice");
        assert_eq!(account.balance, 0);
        assert_eq!(account.currency, Currency::Usd);
    }

    #[tokio::test]
    async fn test_open_account_rejects_bad_input() {
        let (_, service) = service();

        assert!(matches!(
            service.open_account("  ", "USD").await,
            Err(AccountError::EmptyOwner)
        ));
        assert!(matches!(
            service.open_account("alice", "usd").await,
            Err(AccountError::UnsupportedCurrency(_))
        ));
    }

    #[tokio::test]
    async fn test_one_account_per_currency() {
        let (_, service) = service();
        service.open_account("alice", "EUR").await.unwrap();

        let err = service.open_account("alice", "EUR").await.unwrap_err();
        assert!(matches!(err, AccountError::AlreadyExists { .. }));

        service.open_account("alice", "CAD").await.unwrap();
        service.open_account("bob", "EUR").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_account_checks_owner() {
        let (_, service) = service();
        let account = service.open_account("alice", "USD").await.unwrap();

        assert_eq!(service.get_account("alice", account.id).await.unwrap(), account);
        assert!(matches!(
            service.get_account("bob", account.id).await,
            Err(AccountError::Forbidden(_))
        ));
        assert!(matches!(
            service.get_account("alice", account.id + 100).await,
            Err(AccountError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_accounts_paging() {
        let (_, service) = service();
        for currency in Currency::ALL {
            service.open_account("alice", currency.as_str()).await.unwrap();
        }
        service.open_account("bob", "USD").await.unwrap();

        let accounts = service.list_accounts("alice", 1, 5).await.unwrap();
        assert_eq!(accounts.len(), 3);
        assert!(accounts.iter().all(|a| a.owner == "alice"));
        assert!(service.list_accounts("alice", 2, 5).await.unwrap().is_empty());

        for (page_id, page_size) in [(0, 5), (1, 4), (1, 11), (i64::MAX, 10)] {
            assert!(matches!(
                service.list_accounts("alice", page_id, page_size).await,
                Err(AccountError::InvalidPage { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_page_id_too_large_for_offset() {
        let (_, service) = service();
        let account = service.open_account("alice", "USD").await.unwrap();

        let err = service.list_accounts("alice", i64::MAX, 10).await.unwrap_err();
        assert!(matches!(err, AccountError::InvalidPage { page_id: i64::MAX, .. }));
        assert!(matches!(
            service.account_entries("alice", account.id, i64::MAX, 5).await,
            Err(AccountError::InvalidPage { .. })
        ));

        // The largest page id whose offset still fits is a valid, empty page.
        let last = i64::MAX / 10 + 1;
        assert!(service.list_accounts("alice", last, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_account() {
        let (store, service) = service();
        let unused = service.open_account("alice", "USD").await.unwrap();
        let x = service.open_account("alice", "CAD").await.unwrap();
        let y = service.open_account("bob", "CAD").await.unwrap();

        assert!(matches!(
            service.delete_account("bob", unused.id).await,
            Err(AccountError::Forbidden(_))
        ));
        service.delete_account("alice", unused.id).await.unwrap();
        assert!(matches!(
            service.get_account("alice", unused.id).await,
            Err(AccountError::NotFound(_))
        ));

        // Accounts with ledger rows stay.
        TransferEngine::new(Arc::new(store.clone()))
            .allow_overdraft(true)
            .transfer_funds(TransferTxParams {
                from_account_id: x.id,
                to_account_id: y.id,
                amount: 5,
            })
            .await
            .unwrap();
        assert!(matches!(
            service.delete_account("alice", x.id).await,
            Err(AccountError::HasLedgerEntries(_))
        ));
    }

    #[tokio::test]
    async fn test_account_entries() {
        let (store, service) = service();
        let x = service.open_account("alice", "CAD").await.unwrap();
        let y = service.open_account("bob", "CAD").await.unwrap();
        TransferEngine::new(Arc::new(store))
            .allow_overdraft(true)
            .transfer_funds(TransferTxParams {
                from_account_id: x.id,
                to_account_id: y.id,
                amount: 25,
            })
            .await
            .unwrap();

        let entries = service.account_entries("alice", x.id, 1, 5).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, -25);
        assert!(matches!(
            service.account_entries("alice", y.id, 1, 5).await,
            Err(AccountError::Forbidden(_))
        ));
    }
}
