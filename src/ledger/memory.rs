//! In-process ledger store
//!
//! Models the parts of a relational store the transfer engine relies on:
//! - writes are staged per unit of work and published atomically on commit
//! - `add_account_balance` takes a per-row lock held until commit/rollback
//! - lock waits are bounded; a timed-out wait fails with `LockTimeout`,
//!   the way PostgreSQL reports deadlocks and lock timeouts
//!
//! Failures and delays can be injected at each primitive for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

use super::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, Page, Transfer,
};
use super::store::{Ledger, Store, StoreError, UnitOfWork};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Store operation at which a failure or delay can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    CreateAccount,
    CreateTransfer,
    CreateEntry,
    AddAccountBalance,
    Commit,
    Rollback,
}

impl FailPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailPoint::Begin => "BEGIN",
            FailPoint::CreateAccount => "CREATE_ACCOUNT",
            FailPoint::CreateTransfer => "CREATE_TRANSFER",
            FailPoint::CreateEntry => "CREATE_ENTRY",
            FailPoint::AddAccountBalance => "ADD_ACCOUNT_BALANCE",
            FailPoint::Commit => "COMMIT",
            FailPoint::Rollback => "ROLLBACK",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FailRule {
    nth: usize,
    seen: usize,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    next_account_id: AtomicI64,
    next_entry_id: AtomicI64,
    next_transfer_id: AtomicI64,
    lock_timeout: Duration,
    fail_rules: Mutex<HashMap<FailPoint, FailRule>>,
    delays: Mutex<HashMap<FailPoint, Duration>>,
}

// Poisoning only happens if a test panicked while holding the guard.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        lock(&self.tables)
    }

    async fn trip(&self, point: FailPoint) -> Result<(), StoreError> {
        let delay = lock(&self.delays).get(&point).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut rules = lock(&self.fail_rules);
        if let Some(rule) = rules.get_mut(&point) {
            rule.seen += 1;
            if rule.seen >= rule.nth {
                tracing::debug!(point = point.as_str(), "injected store failure");
                return Err(StoreError::Injected(point.as_str()));
            }
        }
        Ok(())
    }

    fn row_lock(&self, account_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.row_locks)
            .entry(account_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn acquire_row(&self, account_id: i64) -> Result<OwnedMutexGuard<()>, StoreError> {
        let row = self.row_lock(account_id);
        tokio::time::timeout(self.lock_timeout, row.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout(account_id))
    }
}

/// In-memory [`Store`] implementation
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create a store whose row-lock waits give up after `lock_timeout`
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                next_account_id: AtomicI64::new(1),
                next_entry_id: AtomicI64::new(1),
                next_transfer_id: AtomicI64::new(1),
                lock_timeout,
                fail_rules: Mutex::new(HashMap::new()),
                delays: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Fail the `nth` call (1-based) to `point` and every call after it
    pub fn fail_on(&self, point: FailPoint, nth: usize) {
        lock(&self.shared.fail_rules).insert(point, FailRule { nth, seen: 0 });
    }

    /// Delay every call to `point`
    pub fn delay_on(&self, point: FailPoint, delay: Duration) {
        lock(&self.shared.delays).insert(point, delay);
    }

    pub fn clear_failures(&self) {
        lock(&self.shared.fail_rules).clear();
        lock(&self.shared.delays).clear();
    }

    /// Committed entry and transfer row counts
    pub fn row_counts(&self) -> (usize, usize) {
        let tables = self.shared.tables();
        (tables.entries.len(), tables.transfers.len())
    }

    /// Sum of all committed account balances
    pub fn total_balance(&self) -> i64 {
        self.shared
            .tables()
            .accounts
            .values()
            .map(|a| a.balance)
            .sum()
    }
}

fn paginate<T>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    rows.skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        self.shared.trip(FailPoint::Begin).await?;
        Ok(Box::new(MemoryUnitOfWork {
            shared: self.shared.clone(),
            accounts: HashMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
            row_guards: HashMap::new(),
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_account(&self, id: i64) -> Result<Account, StoreError> {
        self.shared
            .tables()
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn list_accounts(&self, owner: &str, page: Page) -> Result<Vec<Account>, StoreError> {
        let tables = self.shared.tables();
        Ok(paginate(
            tables.accounts.values().filter(|a| a.owner == owner).cloned(),
            page,
        ))
    }

    async fn delete_account(&self, id: i64) -> Result<(), StoreError> {
        let _row = self.shared.acquire_row(id).await?;
        let mut tables = self.shared.tables();
        if !tables.accounts.contains_key(&id) {
            return Err(StoreError::account_not_found(id));
        }
        let referenced = tables.entries.values().any(|e| e.account_id == id)
            || tables
                .transfers
                .values()
                .any(|t| t.from_account_id == id || t.to_account_id == id);
        if referenced {
            return Err(StoreError::ForeignKeyViolation(format!(
                "account {} is still referenced by ledger rows",
                id
            )));
        }
        tables.accounts.remove(&id);
        Ok(())
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer, StoreError> {
        self.shared
            .tables()
            .transfers
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "transfer",
                id,
            })
    }

    async fn list_transfers(
        &self,
        account_id: i64,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError> {
        let tables = self.shared.tables();
        Ok(paginate(
            tables
                .transfers
                .values()
                .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id)
                .cloned(),
            page,
        ))
    }

    async fn list_entries(&self, account_id: i64, page: Page) -> Result<Vec<Entry>, StoreError> {
        let tables = self.shared.tables();
        Ok(paginate(
            tables
                .entries
                .values()
                .filter(|e| e.account_id == account_id)
                .cloned(),
            page,
        ))
    }
}

/// Unit of work over [`MemoryStore`]
///
/// Dropping it without commit discards staged rows and releases row locks.
pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    accounts: HashMap<i64, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    row_guards: HashMap<i64, OwnedMutexGuard<()>>,
}

impl MemoryUnitOfWork {
    fn visible_account(&self, id: i64) -> Option<Account> {
        self.accounts
            .get(&id)
            .cloned()
            .or_else(|| self.shared.tables().accounts.get(&id).cloned())
    }

    fn require_account(&self, id: i64) -> Result<(), StoreError> {
        match self.visible_account(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::ForeignKeyViolation(format!(
                "account {} does not exist",
                id
            ))),
        }
    }
}

#[async_trait]
impl Ledger for MemoryUnitOfWork {
    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, StoreError> {
        self.shared.trip(FailPoint::CreateAccount).await?;

        let duplicate = self
            .accounts
            .values()
            .chain(self.shared.tables().accounts.values())
            .any(|a| a.owner == params.owner && a.currency == params.currency);
        if duplicate {
            return Err(StoreError::UniqueViolation(format!(
                "owner {} already has a {} account",
                params.owner, params.currency
            )));
        }

        let account = Account {
            id: self.shared.next_account_id.fetch_add(1, Ordering::SeqCst),
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        self.visible_account(id)
            .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        self.shared.trip(FailPoint::CreateTransfer).await?;
        if params.amount <= 0 {
            return Err(StoreError::Conflict(format!(
                "transfer amount must be positive, got {}",
                params.amount
            )));
        }
        self.require_account(params.from_account_id)?;
        self.require_account(params.to_account_id)?;

        let transfer = Transfer {
            id: self.shared.next_transfer_id.fetch_add(1, Ordering::SeqCst),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        self.shared.trip(FailPoint::CreateEntry).await?;
        self.require_account(params.account_id)?;

        let entry = Entry {
            id: self.shared.next_entry_id.fetch_add(1, Ordering::SeqCst),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.shared.trip(FailPoint::AddAccountBalance).await?;

        if !self.row_guards.contains_key(&params.id) {
            let guard = self.shared.acquire_row(params.id).await?;
            self.row_guards.insert(params.id, guard);
        }

        // Row lock held: the committed row cannot change under us.
        let mut account = self
            .visible_account(params.id)
            .ok_or_else(|| StoreError::account_not_found(params.id))?;

        let balance = account
            .balance
            .checked_add(params.amount)
            .ok_or(StoreError::BalanceOverflow(params.id))?;
        if params.enforce_non_negative && balance < 0 {
            return Err(StoreError::InsufficientFunds {
                account_id: params.id,
                balance: account.balance,
                delta: params.amount,
            });
        }

        account.balance = balance;
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn ledger(&mut self) -> &mut dyn Ledger {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.shared.trip(FailPoint::Commit).await?;

        let mut this = *self;
        let mut tables = this.shared.tables();

        // Another unit of work may have committed the same (owner, currency)
        // since this one staged its account.
        let duplicate = this.accounts.values().find(|staged| {
            !tables.accounts.contains_key(&staged.id)
                && tables
                    .accounts
                    .values()
                    .any(|a| a.owner == staged.owner && a.currency == staged.currency)
        });
        if let Some(staged) = duplicate {
            return Err(StoreError::UniqueViolation(format!(
                "owner {} already has a {} account",
                staged.owner, staged.currency
            )));
        }

        for (id, account) in this.accounts.drain() {
            tables.accounts.insert(id, account);
        }
        for entry in this.entries.drain(..) {
            tables.entries.insert(entry.id, entry);
        }
        for transfer in this.transfers.drain(..) {
            tables.transfers.insert(transfer.id, transfer);
        }
        drop(tables);

        // Publish before releasing row locks.
        this.row_guards.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged rows and row locks go away with `self` either way.
        self.shared.trip(FailPoint::Rollback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::Currency;

    fn account_params(owner: &str, balance: i64) -> CreateAccountParams {
        CreateAccountParams {
            owner: owner.to_string(),
            balance,
            currency: Currency::Cad,
        }
    }

    fn adjust(id: i64, amount: i64) -> AddAccountBalanceParams {
        AddAccountBalanceParams {
            id,
            amount,
            enforce_non_negative: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let store = MemoryStore::new();
        let account = store.create_account(account_params("alice", 100)).await.unwrap();

        let fetched = Store::get_account(&store, account.id).await.unwrap();
        assert_eq!(fetched, account);
        assert!(Store::get_account(&store, 999).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_owner_currency_rejected() {
        let store = MemoryStore::new();
        store.create_account(account_params("alice", 0)).await.unwrap();

        let err = store
            .create_account(account_params("alice", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_account_rejected_at_commit() {
        let store = MemoryStore::new();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.create_account(account_params("alice", 0)).await.unwrap();
        second.create_account(account_params("alice", 0)).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let accounts = store.list_accounts("alice", Page::new(1, 10)).await.unwrap();
        assert_eq!(accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let store = MemoryStore::new();
        let account = store.create_account(account_params("alice", 100)).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let updated = uow.add_account_balance(adjust(account.id, -40)).await.unwrap();
        assert_eq!(updated.balance, 60);
        assert_eq!(
            Store::get_account(&store, account.id).await.unwrap().balance,
            100
        );

        uow.commit().await.unwrap();
        assert_eq!(
            Store::get_account(&store, account.id).await.unwrap().balance,
            60
        );
    }

    #[tokio::test]
    async fn test_rollback_discards_rows() {
        let store = MemoryStore::new();
        let a = store.create_account(account_params("alice", 100)).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.create_entry(CreateEntryParams {
            account_id: a.id,
            amount: -10,
        })
        .await
        .unwrap();
        uow.add_account_balance(adjust(a.id, -10)).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(store.row_counts(), (0, 0));
        assert_eq!(Store::get_account(&store, a.id).await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_releases_row_lock() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(50));
        let a = store.create_account(account_params("alice", 100)).await.unwrap();

        {
            let mut uow = store.begin().await.unwrap();
            uow.add_account_balance(adjust(a.id, -1)).await.unwrap();
        }

        let mut uow = store.begin().await.unwrap();
        let updated = uow.add_account_balance(adjust(a.id, -1)).await.unwrap();
        assert_eq!(updated.balance, 99);
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let store = MemoryStore::new();
        let a = store.create_account(account_params("alice", 100)).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let err = uow.add_account_balance(adjust(a.id, -150)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientFunds {
                balance: 100,
                delta: -150,
                ..
            }
        ));

        let overdraft = uow
            .add_account_balance(AddAccountBalanceParams {
                id: a.id,
                amount: -150,
                enforce_non_negative: false,
            })
            .await
            .unwrap();
        assert_eq!(overdraft.balance, -50);
    }

    #[tokio::test]
    async fn test_reverse_lock_order_times_out() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(50));
        let a = store.create_account(account_params("alice", 100)).await.unwrap();
        let b = store.create_account(account_params("bob", 100)).await.unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.add_account_balance(adjust(a.id, -1)).await.unwrap();
        second.add_account_balance(adjust(b.id, -1)).await.unwrap();

        let err = first.add_account_balance(adjust(b.id, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(id) if id == b.id));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_entry_requires_existing_account() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let err = uow
            .create_entry(CreateEntryParams {
                account_id: 42,
                amount: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn test_fail_on_nth_call() {
        let store = MemoryStore::new();
        let a = store.create_account(account_params("alice", 0)).await.unwrap();
        store.fail_on(FailPoint::CreateEntry, 2);

        let mut uow = store.begin().await.unwrap();
        let entry = CreateEntryParams {
            account_id: a.id,
            amount: 5,
        };
        assert!(uow.create_entry(entry).await.is_ok());
        assert!(matches!(
            uow.create_entry(entry).await,
            Err(StoreError::Injected("CREATE_ENTRY"))
        ));

        store.clear_failures();
        assert!(uow.create_entry(entry).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_account_refuses_referenced_rows() {
        let store = MemoryStore::new();
        let a = store.create_account(account_params("alice", 0)).await.unwrap();
        let b = store.create_account(account_params("bob", 0)).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.create_entry(CreateEntryParams {
            account_id: a.id,
            amount: 0,
        })
        .await
        .unwrap();
        uow.commit().await.unwrap();

        assert!(matches!(
            store.delete_account(a.id).await,
            Err(StoreError::ForeignKeyViolation(_))
        ));
        store.delete_account(b.id).await.unwrap();
        assert!(store.delete_account(b.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_accounts_paginates_by_owner() {
        let store = MemoryStore::new();
        for currency in Currency::ALL {
            store
                .create_account(CreateAccountParams {
                    owner: "alice".into(),
                    balance: 0,
                    currency,
                })
                .await
                .unwrap();
        }
        store.create_account(account_params("bob", 0)).await.unwrap();

        let first = store.list_accounts("alice", Page::new(1, 2)).await.unwrap();
        let second = store.list_accounts("alice", Page::new(2, 2)).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(first.iter().chain(&second).all(|a| a.owner == "alice"));
    }
}
