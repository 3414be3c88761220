//! Account/currency guard
//!
//! Preconditions checked before a transfer's unit of work opens. The guard
//! only reads, outside the transfer transaction, so an account may change
//! between the check and the transfer. That race is accepted: the engine's
//! own invariants (row locks, non-negative debit) still hold.

use std::sync::Arc;

use super::error::TransferError;
use super::types::{TransferRequest, TransferTxParams};
use crate::ledger::{Account, Currency, Store, StoreError};

pub struct AccountGuard {
    store: Arc<dyn Store>,
}

impl AccountGuard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate a transfer request and turn it into engine parameters.
    ///
    /// Check order: request shape, source account (existence, currency),
    /// source ownership, destination account (existence, currency).
    pub async fn check(&self, req: &TransferRequest) -> Result<TransferTxParams, TransferError> {
        if req.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }
        let currency: Currency = req
            .currency
            .parse()
            .map_err(|_| TransferError::UnsupportedCurrency(req.currency.clone()))?;
        if req.from_account_id == req.to_account_id {
            return Err(TransferError::SameAccount);
        }

        let from = self.valid_account(req.from_account_id, currency).await?;
        if from.owner != req.principal {
            return Err(TransferError::Forbidden(from.id));
        }

        self.valid_account(req.to_account_id, currency).await?;

        Ok(TransferTxParams {
            from_account_id: req.from_account_id,
            to_account_id: req.to_account_id,
            amount: req.amount,
        })
    }

    async fn valid_account(
        &self,
        account_id: i64,
        currency: Currency,
    ) -> Result<Account, TransferError> {
        let account = self.store.get_account(account_id).await.map_err(|e| match e {
            StoreError::NotFound { .. } => TransferError::AccountNotFound(account_id),
            other => TransferError::Store(other),
        })?;

        if account.currency != currency {
            return Err(TransferError::CurrencyMismatch {
                account_id,
                actual: account.currency.to_string(),
                expected: currency.to_string(),
            });
        }
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CreateAccountParams, MemoryStore};

    struct Fixture {
        guard: AccountGuard,
        alice_cad: Account,
        bob_cad: Account,
        bob_usd: Account,
    }

    async fn open(store: &MemoryStore, owner: &str, currency: Currency) -> Account {
        store
            .create_account(CreateAccountParams {
                owner: owner.into(),
                balance: 100,
                currency,
            })
            .await
            .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let alice_cad = open(&store, "alice", Currency::Cad).await;
        let bob_cad = open(&store, "bob", Currency::Cad).await;
        let bob_usd = open(&store, "bob", Currency::Usd).await;
        Fixture {
            guard: AccountGuard::new(Arc::new(store)),
            alice_cad,
            bob_cad,
            bob_usd,
        }
    }

    #[tokio::test]
    async fn test_valid_request() {
        let f = fixture().await;
        let req = TransferRequest::new("alice", f.alice_cad.id, f.bob_cad.id, 30, "CAD");

        let params = f.guard.check(&req).await.unwrap();
        assert_eq!(
            params,
            TransferTxParams {
                from_account_id: f.alice_cad.id,
                to_account_id: f.bob_cad.id,
                amount: 30,
            }
        );
    }

    #[tokio::test]
    async fn test_missing_accounts_are_not_found() {
        let f = fixture().await;

        let missing_source = TransferRequest::new("alice", 999, f.bob_cad.id, 30, "CAD");
        assert!(matches!(
            f.guard.check(&missing_source).await,
            Err(TransferError::AccountNotFound(999))
        ));

        let missing_dest = TransferRequest::new("alice", f.alice_cad.id, 999, 30, "CAD");
        assert!(matches!(
            f.guard.check(&missing_dest).await,
            Err(TransferError::AccountNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_currency_mismatch() {
        let f = fixture().await;

        let wrong_source = TransferRequest::new("alice", f.alice_cad.id, f.bob_usd.id, 30, "USD");
        let err = f.guard.check(&wrong_source).await.unwrap_err();
        assert!(
            matches!(err, TransferError::CurrencyMismatch { account_id, .. } if account_id == f.alice_cad.id)
        );

        let wrong_dest = TransferRequest::new("alice", f.alice_cad.id, f.bob_usd.id, 30, "CAD");
        let err = f.guard.check(&wrong_dest).await.unwrap_err();
        assert!(
            matches!(err, TransferError::CurrencyMismatch { account_id, .. } if account_id == f.bob_usd.id)
        );
    }

    #[tokio::test]
    async fn test_source_must_belong_to_principal() {
        let f = fixture().await;
        let req = TransferRequest::new("mallory", f.alice_cad.id, f.bob_cad.id, 30, "CAD");

        assert!(matches!(
            f.guard.check(&req).await,
            Err(TransferError::Forbidden(id)) if id == f.alice_cad.id
        ));
    }

    #[tokio::test]
    async fn test_request_shape() {
        let f = fixture().await;
        let (a, b) = (f.alice_cad.id, f.bob_cad.id);

        assert!(matches!(
            f.guard.check(&TransferRequest::new("alice", a, b, 0, "CAD")).await,
            Err(TransferError::InvalidAmount)
        ));
        assert!(matches!(
            f.guard.check(&TransferRequest::new("alice", a, b, 10, "GBP")).await,
            Err(TransferError::UnsupportedCurrency(_))
        ));
        assert!(matches!(
            f.guard.check(&TransferRequest::new("alice", a, a, 10, "CAD")).await,
            Err(TransferError::SameAccount)
        ));
    }

    #[tokio::test]
    async fn test_decision_is_stable_for_unchanged_state() {
        let f = fixture().await;
        let accepted = TransferRequest::new("alice", f.alice_cad.id, f.bob_cad.id, 30, "CAD");
        let rejected = TransferRequest::new("bob", f.alice_cad.id, f.bob_cad.id, 30, "CAD");

        for _ in 0..2 {
            assert!(f.guard.check(&accepted).await.is_ok());
            assert!(f.guard.check(&rejected).await.is_err());
        }
    }
}
