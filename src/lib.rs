//! bank_ledger - Transactional funds-transfer engine
//!
//! Accounts, an append-only ledger of entries, and transfers that move money
//! between two accounts as one atomic unit of work.
//!
//! # Modules
//!
//! - [`ledger`] - Ledger models and store capabilities (PostgreSQL, in-memory)
//! - [`transfer`] - Unit-of-work executor, transfer engine, account guard
//! - [`account`] - Account service
//! - [`gateway`] - HTTP API
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL pool and schema

pub mod account;
pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{AccountError, AccountService};
pub use ledger::{Account, Currency, Entry, MemoryStore, PgStore, Store, StoreError, Transfer};
pub use transfer::{
    TransferEngine, TransferError, TransferRequest, TransferService, TransferTxParams,
    TransferTxResult, TxError,
};
