//! Funds transfers
//!
//! A transfer moves money between two accounts of the same currency in one
//! unit of work:
//!
//! ```text
//! TransferRequest → AccountGuard::check → TransferEngine::transfer_funds
//!                                           └─ TxExecutor::exec_tx (begin → body → commit | rollback)
//! ```
//!
//! # Invariants
//!
//! 1. **Conservation**: each transfer writes two entries summing to zero
//! 2. **Atomicity**: the transfer row, both entries and both balance updates commit together or not at all
//! 3. **Lock order**: balance rows are locked lower account id first
//! 4. **No retry**: failed units of work are reported, never resubmitted here

pub mod engine;
pub mod error;
pub mod executor;
pub mod guard;
pub mod service;
pub mod types;


pub use engine::{TransferEngine, adjustment_order};
pub use error::{TransferError, TxError};
pub use executor::TxExecutor;
pub use guard::AccountGuard;
pub use service::TransferService;
pub use types::{TransferRequest, TransferTxParams, TransferTxResult};
