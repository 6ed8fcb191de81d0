//! Account service - account lifecycle for authenticated users

use std::sync::Arc;

use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Entry};
use crate::ports::{
    CreateAccountParams, ListAccountsParams, ListEntriesParams, Store, StoreTx, UpdateAccountParams,
};

/// Page size cap for list operations
pub const MAX_PAGE_SIZE: i64 = 100;

/// Reject page sizes outside `1..=MAX_PAGE_SIZE` and negative offsets
pub(crate) fn check_page(limit: i64, offset: i64) -> Result<()> {
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(Error::validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    if offset < 0 {
        return Err(Error::validation("offset must not be negative"));
    }
    Ok(())
}

/// Account service
pub struct AccountService {
    store: Arc<dyn Store>,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Open an empty account for `owner`; one account per currency per owner
    pub async fn create_account(&self, owner: &str, currency: &str) -> Result<Account> {
        let currency = Account::validate_currency(currency)?;
        self.store
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                balance: 0,
                currency,
            })
            .await
    }

    /// Fetch an account owned by `username`
    pub async fn get_account(&self, username: &str, id: i64) -> Result<Account> {
        let account = self.store.get_account(id).await?;
        if account.owner != username {
            return Err(Error::AccountNotOwned {
                account_id: id,
                username: username.to_string(),
            });
        }
        Ok(account)
    }

    pub async fn list_accounts(
        &self,
        username: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>> {
        check_page(limit, offset)?;
        self.store
            .list_accounts(ListAccountsParams {
                owner: username.to_string(),
                limit,
                offset,
            })
            .await
    }

    /// Ledger entries of an account owned by `username`, oldest first
    pub async fn list_entries(
        &self,
        username: &str,
        account_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>> {
        check_page(limit, offset)?;
        self.get_account(username, account_id).await?;
        self.store
            .list_entries(ListEntriesParams {
                account_id,
                limit,
                offset,
            })
            .await
    }

    /// Overwrite a balance directly (operator funding and corrections)
    ///
    /// Bypasses the transfer engine, so no entries are written.
    pub async fn set_balance(&self, id: i64, balance: i64) -> Result<Account> {
        if balance < 0 {
            return Err(Error::validation("balance must not be negative"));
        }
        self.store
            .update_account(UpdateAccountParams { id, balance })
            .await
    }

    /// Close an empty account owned by `username`
    ///
    /// The balance is checked and the row removed inside one unit of work
    /// that holds the row lock, so a transfer into the account either
    /// commits first and the close fails, or waits and finds it gone.
    pub async fn delete_account(&self, username: &str, id: i64) -> Result<()> {
        let mut tx = self.store.begin().await?;
        match close_account(tx.as_mut(), username, id).await {
            Ok(()) => tx.commit().await,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed close also failed");
                }
                Err(e)
            }
        }
    }
}

async fn close_account(tx: &mut dyn StoreTx, username: &str, id: i64) -> Result<()> {
    let account = tx.get_account_for_update(id).await?;
    if account.owner != username {
        return Err(Error::AccountNotOwned {
            account_id: id,
            username: username.to_string(),
        });
    }
    if account.balance != 0 {
        return Err(Error::validation(
            "account balance must be zero before it can be closed",
        ));
    }
    tx.delete_account(id).await
}
