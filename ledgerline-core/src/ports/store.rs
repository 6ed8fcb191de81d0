//! Store port - ledger persistence abstraction

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{Account, Entry, Transfer, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAccountsParams {
    pub owner: String,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateAccountParams {
    pub id: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntriesParams {
    pub account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Transfers where `from_account_id` or `to_account_id` matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserParams {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

/// Partial user update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateUserParams {
    pub username: String,
    pub hashed_password: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Ledger store
///
/// Single-row operations run in their own implicit unit of work. Anything
/// that has to change several rows atomically goes through [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Start an atomic unit of work
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    // === Accounts ===

    /// Insert an account; the owner must exist and may hold one account per currency
    async fn create_account(&self, params: CreateAccountParams) -> Result<Account>;

    async fn get_account(&self, id: i64) -> Result<Account>;

    /// Accounts of one owner, ordered by id
    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>>;

    /// Overwrite an account balance (administrative correction)
    async fn update_account(&self, params: UpdateAccountParams) -> Result<Account>;

    // === Entries ===

    async fn get_entry(&self, id: i64) -> Result<Entry>;

    async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>>;

    // === Transfers ===

    async fn get_transfer(&self, id: i64) -> Result<Transfer>;

    async fn list_transfers(&self, params: ListTransfersParams) -> Result<Vec<Transfer>>;

    // === Users ===

    async fn create_user(&self, params: CreateUserParams) -> Result<User>;

    async fn get_user(&self, username: &str) -> Result<User>;

    async fn update_user(&self, params: UpdateUserParams) -> Result<User>;
}

/// One atomic unit of work
///
/// Writes become visible to other units only on [`StoreTx::commit`].
/// Dropping a unit without committing rolls it back, which is also what
/// happens when the future driving it is cancelled.
#[async_trait]
pub trait StoreTx: Send {
    /// Read an account and hold its row lock until the unit ends
    ///
    /// Locking a row this unit already holds returns the unit's own view of
    /// it without acquiring anything.
    async fn get_account_for_update(&mut self, id: i64) -> Result<Account>;

    /// Atomically add `amount` to the stored balance and return the updated row
    async fn add_account_balance(&mut self, id: i64, amount: i64) -> Result<Account>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry>;

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer>;

    /// Remove an account row, locking it first if this unit does not hold it
    ///
    /// Callers check the balance under the same lock; the store itself
    /// deletes whatever row it is given.
    async fn delete_account(&mut self, id: i64) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
