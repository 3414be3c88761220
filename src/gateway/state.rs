use std::sync::Arc;

use crate::account::AccountService;
use crate::config::LedgerConfig;
use crate::ledger::Store;
use crate::transfer::TransferService;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    /// Ledger store, also used for health checks
    pub store: Arc<dyn Store>,
    pub accounts: AccountService,
    pub transfers: TransferService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, ledger: &LedgerConfig) -> Self {
        Self {
            accounts: AccountService::new(store.clone()),
            transfers: TransferService::new(
                store.clone(),
                ledger.allow_overdraft,
                ledger.tx_deadline(),
            ),
            store,
        }
    }
}
