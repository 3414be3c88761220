//! Ledger storage
//!
//! Accounts, entries and transfers, plus the store capabilities the transfer
//! engine runs on:
//! - [`store`]: `Ledger` / `UnitOfWork` / `Store` traits and `StoreError`
//! - [`postgres`]: sqlx-backed store
//! - [`memory`]: in-process store with row locks and fail injection

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::{FailPoint, MemoryStore};
pub use models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Currency, Entry, Page, Transfer, UnsupportedCurrency,
};
pub use postgres::PgStore;
pub use store::{Ledger, Store, StoreError, UnitOfWork};
