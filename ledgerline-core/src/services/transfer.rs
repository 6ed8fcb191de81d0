//! Transfer service - atomic money movement between two accounts
//!
//! A transfer is one unit of work that writes a transfer record, one debit
//! entry, one credit entry and both balance changes. Either all of it
//! commits or none of it is visible.
//!
//! Both account rows are locked in ascending id order, and the balance
//! updates are applied in the same order. Two transfers over the same pair
//! of accounts therefore always contend for the lower id first, which rules
//! out the A-waits-for-B / B-waits-for-A cycle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::account::check_page;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, Entry, Transfer};
use crate::ports::{CreateEntryParams, CreateTransferParams, ListTransfersParams, Store, StoreTx};

/// Input to [`TransferService::transfer_tx`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Everything a committed transfer wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// An authenticated caller's transfer request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
}

/// Transfer service
pub struct TransferService {
    store: Arc<dyn Store>,
}

impl TransferService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Move `amount` from one account to another atomically
    ///
    /// Fails without side effects on a non-positive amount, a self transfer,
    /// an unknown account, mismatched currencies or insufficient funds. A
    /// failed commit is reported as [`Error::TransactionAborted`] and is not
    /// retried. Dropping the returned future before it resolves rolls the
    /// unit back.
    pub async fn transfer_tx(&self, params: TransferTxParams) -> Result<TransferTxResult> {
        if params.amount <= 0 {
            return Err(Error::InvalidAmount(params.amount));
        }
        if params.from_account_id == params.to_account_id {
            return Err(Error::SameAccount(params.from_account_id));
        }

        debug!(
            from = params.from_account_id,
            to = params.to_account_id,
            "starting transfer"
        );

        let mut tx = self.store.begin().await?;
        match apply_transfer(tx.as_mut(), params).await {
            Ok(result) => {
                tx.commit().await.map_err(|e| match e {
                    Error::TransactionAborted(_) => e,
                    other => Error::aborted(other.to_string()),
                })?;
                info!(transfer_id = result.transfer.id, "transfer committed");
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed transfer also failed");
                }
                debug!(error = %e, "transfer rolled back");
                Err(e)
            }
        }
    }

    /// Validate an authenticated request, then run [`Self::transfer_tx`]
    ///
    /// Both accounts must hold `currency`, and the source account must
    /// belong to `username`.
    pub async fn create_transfer(
        &self,
        username: &str,
        request: TransferRequest,
    ) -> Result<TransferTxResult> {
        let currency = Account::validate_currency(&request.currency)?;

        let from = self.valid_account(request.from_account_id, &currency).await?;
        if from.owner != username {
            return Err(Error::AccountNotOwned {
                account_id: from.id,
                username: username.to_string(),
            });
        }
        self.valid_account(request.to_account_id, &currency).await?;

        self.transfer_tx(TransferTxParams {
            from_account_id: request.from_account_id,
            to_account_id: request.to_account_id,
            amount: request.amount,
        })
        .await
    }

    /// Transfers into or out of an account owned by `username`, oldest first
    pub async fn list_transfers(
        &self,
        username: &str,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transfer>> {
        check_page(limit, offset)?;
        let account = self.store.get_account(account_id).await?;
        if account.owner != username {
            return Err(Error::AccountNotOwned {
                account_id,
                username: username.to_string(),
            });
        }
        self.store
            .list_transfers(ListTransfersParams {
                from_account_id: account_id,
                to_account_id: account_id,
                limit,
                offset,
            })
            .await
    }

    async fn valid_account(&self, account_id: i64, currency: &str) -> Result<Account> {
        let account = self.store.get_account(account_id).await?;
        if account.currency != currency {
            return Err(Error::CurrencyMismatch {
                account_id,
                expected: currency.to_string(),
                actual: account.currency,
            });
        }
        Ok(account)
    }
}

/// The body of a transfer, run inside an open unit of work
async fn apply_transfer(
    tx: &mut dyn StoreTx,
    params: TransferTxParams,
) -> Result<TransferTxResult> {
    let TransferTxParams {
        from_account_id,
        to_account_id,
        amount,
    } = params;

    // Lower id first, always.
    let (first, second) = if from_account_id < to_account_id {
        (from_account_id, to_account_id)
    } else {
        (to_account_id, from_account_id)
    };
    let first_account = tx.get_account_for_update(first).await?;
    let second_account = tx.get_account_for_update(second).await?;
    let (from, to) = if first == from_account_id {
        (first_account, second_account)
    } else {
        (second_account, first_account)
    };

    if to.currency != from.currency {
        return Err(Error::CurrencyMismatch {
            account_id: to.id,
            expected: from.currency,
            actual: to.currency,
        });
    }
    if from.balance < amount {
        return Err(Error::InsufficientFunds {
            account_id: from.id,
            balance: from.balance,
            amount,
        });
    }

    let transfer = tx
        .create_transfer(CreateTransferParams {
            from_account_id,
            to_account_id,
            amount,
        })
        .await?;
    let from_entry = tx
        .create_entry(CreateEntryParams {
            account_id: from_account_id,
            amount: -amount,
        })
        .await?;
    let to_entry = tx
        .create_entry(CreateEntryParams {
            account_id: to_account_id,
            amount,
        })
        .await?;

    let (from_account, to_account) = if from_account_id < to_account_id {
        let from_account = tx.add_account_balance(from_account_id, -amount).await?;
        let to_account = tx.add_account_balance(to_account_id, amount).await?;
        (from_account, to_account)
    } else {
        let to_account = tx.add_account_balance(to_account_id, amount).await?;
        let from_account = tx.add_account_balance(from_account_id, -amount).await?;
        (from_account, to_account)
    };

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::ports::{CreateAccountParams, CreateUserParams};
    use crate::services::MAX_PAGE_SIZE;

    async fn setup() -> (Arc<MemoryStore>, TransferService) {
        let store = Arc::new(MemoryStore::new());
        for username in ["alice", "bob"] {
            store
                .create_user(CreateUserParams {
                    username: username.to_string(),
                    hashed_password: "hash".to_string(),
                    full_name: username.to_string(),
                    email: format!("{username}@example.com"),
                })
                .await
                .unwrap();
        }
        let service = TransferService::new(store.clone());
        (store, service)
    }

    async fn account(store: &MemoryStore, owner: &str, currency: &str, balance: i64) -> Account {
        store
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                balance,
                currency: currency.to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_transfer_writes_everything() {
        let (store, service) = setup().await;
        let a = account(&store, "alice", "USD", 100).await;
        let b = account(&store, "bob", "USD", 50).await;

        let result = service
            .transfer_tx(TransferTxParams {
                from_account_id: a.id,
                to_account_id: b.id,
                amount: 30,
            })
            .await
            .unwrap();

        assert_eq!(result.transfer.amount, 30);
        assert_eq!(result.from_entry.amount, -30);
        assert_eq!(result.to_entry.amount, 30);
        assert_eq!(result.from_account.balance, 70);
        assert_eq!(result.to_account.balance, 80);
        assert_eq!(store.get_transfer(result.transfer.id).await.unwrap(), result.transfer);
    }

    #[tokio::test]
    async fn test_transfer_from_higher_id_to_lower_id() {
        let (store, service) = setup().await;
        let a = account(&store, "alice", "USD", 100).await;
        let b = account(&store, "bob", "USD", 50).await;

        let result = service
            .transfer_tx(TransferTxParams {
                from_account_id: b.id,
                to_account_id: a.id,
                amount: 50,
            })
            .await
            .unwrap();

        assert_eq!(result.from_account.id, b.id);
        assert_eq!(result.from_account.balance, 0);
        assert_eq!(result.to_account.id, a.id);
        assert_eq!(result.to_account.balance, 150);
    }

    #[tokio::test]
    async fn test_rejects_bad_amounts() {
        let (store, service) = setup().await;
        let a = account(&store, "alice", "USD", 100).await;
        let b = account(&store, "bob", "USD", 50).await;

        for amount in [0, -5] {
            let err = service
                .transfer_tx(TransferTxParams {
                    from_account_id: a.id,
                    to_account_id: b.id,
                    amount,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidAmount(n) if n == amount));
        }
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (store, service) = setup().await;
        let a = account(&store, "alice", "USD", 100).await;

        let err = service
            .transfer_tx(TransferTxParams {
                from_account_id: a.id,
                to_account_id: 9999,
                amount: 10,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(9999)));
        assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_currency_mismatch_between_accounts() {
        let (store, service) = setup().await;
        let a = account(&store, "alice", "USD", 100).await;
        let b = account(&store, "bob", "EUR", 50).await;

        let err = service
            .transfer_tx(TransferTxParams {
                from_account_id: a.id,
                to_account_id: b.id,
                amount: 10,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CurrencyMismatch { account_id, .. } if account_id == b.id));
    }

    #[tokio::test]
    async fn test_create_transfer_checks_owner_and_currency() {
        let (store, service) = setup().await;
        let a = account(&store, "alice", "USD", 100).await;
        let b = account(&store, "bob", "USD", 50).await;

        let request = TransferRequest {
            from_account_id: a.id,
            to_account_id: b.id,
            amount: 10,
            currency: "usd".to_string(),
        };

        let err = service
            .create_transfer("bob", request.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotOwned { .. }));

        let err = service
            .create_transfer(
                "alice",
                TransferRequest {
                    currency: "EUR".to_string(),
                    ..request.clone()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CurrencyMismatch { .. }));

        let result = service.create_transfer("alice", request).await.unwrap();
        assert_eq!(result.from_account.balance, 90);

        let listed = service.list_transfers("bob", b.id, 10, 0).await.unwrap();
        assert_eq!(listed, vec![result.transfer]);
        assert!(matches!(
            service.list_transfers("bob", a.id, 10, 0).await,
            Err(Error::AccountNotOwned { .. })
        ));

        for (limit, offset) in [(0, 0), (MAX_PAGE_SIZE + 1, 0), (10, -1)] {
            assert!(matches!(
                service.list_transfers("bob", b.id, limit, offset).await,
                Err(Error::Validation(_))
            ));
        }
    }
}
