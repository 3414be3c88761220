//! Account management
//!
//! Opening, reading, listing and deleting accounts for an authenticated
//! principal, plus the audit read of an account's ledger entries.

pub mod error;
pub mod service;

pub use error::AccountError;
pub use service::{AccountService, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
