//! In-memory store with per-row locking
//!
//! Each account row carries its own async mutex. A unit of work keeps the
//! owned guards of every row it touched and stages its writes, so nothing
//! is visible to other units until commit. Dropping the unit releases the
//! guards and discards the staged writes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Entry, Transfer, User};
use crate::ports::{
    CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    ListAccountsParams, ListEntriesParams, ListTransfersParams, Store, StoreTx,
    UpdateAccountParams, UpdateUserParams,
};

/// Mutable part of an account row
#[derive(Debug)]
struct RowState {
    balance: i64,
    deleted: bool,
}

/// An account row; only `state` ever changes
#[derive(Debug)]
struct AccountRow {
    id: i64,
    owner: String,
    currency: String,
    created_at: DateTime<Utc>,
    state: Arc<Mutex<RowState>>,
}

impl AccountRow {
    fn to_account(&self, balance: i64) -> Account {
        Account {
            id: self.id,
            owner: self.owner.clone(),
            balance,
            currency: self.currency.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: RwLock<BTreeMap<String, User>>,
    accounts: RwLock<BTreeMap<i64, Arc<AccountRow>>>,
    entries: RwLock<BTreeMap<i64, Entry>>,
    transfers: RwLock<BTreeMap<i64, Transfer>>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
}

impl Tables {
    async fn account_row(&self, id: i64) -> Result<Arc<AccountRow>> {
        self.accounts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::AccountNotFound(id))
    }
}

/// Next value of an id sequence; like a database sequence, rolled back
/// units leave gaps.
fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

fn page<T>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

/// A thread-safe in-memory ledger store.
///
/// Cheap to clone; clones share the same tables.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

impl MemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            tables: Arc::clone(&self.tables),
            locked: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        }))
    }

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account> {
        if !self.tables.users.read().await.contains_key(&params.owner) {
            return Err(Error::UserNotFound(params.owner));
        }

        let mut accounts = self.tables.accounts.write().await;
        let taken = accounts
            .values()
            .any(|row| row.owner == params.owner && row.currency == params.currency);
        if taken {
            return Err(Error::AccountExists {
                owner: params.owner,
                currency: params.currency,
            });
        }

        let row = AccountRow {
            id: next_id(&self.tables.account_seq),
            owner: params.owner,
            currency: params.currency,
            created_at: Utc::now(),
            state: Arc::new(Mutex::new(RowState {
                balance: params.balance,
                deleted: false,
            })),
        };
        let account = row.to_account(params.balance);
        accounts.insert(row.id, Arc::new(row));

        Ok(account)
    }

    async fn get_account(&self, id: i64) -> Result<Account> {
        let row = self.tables.account_row(id).await?;
        let state = row.state.lock().await;
        if state.deleted {
            return Err(Error::AccountNotFound(id));
        }
        Ok(row.to_account(state.balance))
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>> {
        let rows: Vec<Arc<AccountRow>> = {
            let accounts = self.tables.accounts.read().await;
            let owned = accounts
                .values()
                .filter(|row| row.owner == params.owner)
                .cloned();
            page(owned, params.limit, params.offset)
        };

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let state = row.state.lock().await;
            if !state.deleted {
                result.push(row.to_account(state.balance));
            }
        }
        Ok(result)
    }

    async fn update_account(&self, params: UpdateAccountParams) -> Result<Account> {
        let row = self.tables.account_row(params.id).await?;
        let mut state = row.state.lock().await;
        if state.deleted {
            return Err(Error::AccountNotFound(params.id));
        }
        state.balance = params.balance;
        Ok(row.to_account(state.balance))
    }

    async fn get_entry(&self, id: i64) -> Result<Entry> {
        self.tables
            .entries
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::EntryNotFound(id))
    }

    async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>> {
        let entries = self.tables.entries.read().await;
        let matching = entries
            .values()
            .filter(|e| e.account_id == params.account_id)
            .cloned();
        Ok(page(matching, params.limit, params.offset))
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer> {
        self.tables
            .transfers
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::TransferNotFound(id))
    }

    async fn list_transfers(&self, params: ListTransfersParams) -> Result<Vec<Transfer>> {
        let transfers = self.tables.transfers.read().await;
        let matching = transfers
            .values()
            .filter(|t| {
                t.from_account_id == params.from_account_id
                    || t.to_account_id == params.to_account_id
            })
            .cloned();
        Ok(page(matching, params.limit, params.offset))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<User> {
        let mut users = self.tables.users.write().await;
        if users.contains_key(&params.username) {
            return Err(Error::UserExists(params.username));
        }

        let user = User {
            username: params.username,
            hashed_password: params.hashed_password,
            full_name: params.full_name,
            email: params.email,
            password_changed_at: None,
            created_at: Utc::now(),
        };
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<User> {
        self.tables
            .users
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<User> {
        let mut users = self.tables.users.write().await;
        let user = users
            .get_mut(&params.username)
            .ok_or_else(|| Error::UserNotFound(params.username.clone()))?;

        if let Some(hashed_password) = params.hashed_password {
            user.hashed_password = hashed_password;
            user.password_changed_at = Some(Utc::now());
        }
        if let Some(full_name) = params.full_name {
            user.full_name = full_name;
        }
        if let Some(email) = params.email {
            user.email = email;
        }
        Ok(user.clone())
    }
}

/// A row held by a unit of work, with the unit's staged state
struct LockedRow {
    row: Arc<AccountRow>,
    guard: OwnedMutexGuard<RowState>,
    balance: i64,
    deleted: bool,
}

/// Unit of work over a [`MemoryStore`]
pub struct MemoryTx {
    tables: Arc<Tables>,
    locked: BTreeMap<i64, LockedRow>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl MemoryTx {
    async fn lock_row(&mut self, id: i64) -> Result<&mut LockedRow> {
        if !self.locked.contains_key(&id) {
            let row = self.tables.account_row(id).await?;
            let guard = Arc::clone(&row.state).lock_owned().await;
            if guard.deleted {
                return Err(Error::AccountNotFound(id));
            }
            let balance = guard.balance;
            self.locked.insert(
                id,
                LockedRow {
                    row,
                    guard,
                    balance,
                    deleted: false,
                },
            );
        }
        match self.locked.get_mut(&id) {
            Some(locked) if !locked.deleted => Ok(locked),
            _ => Err(Error::AccountNotFound(id)),
        }
    }

    async fn ensure_account(&self, id: i64) -> Result<()> {
        match self.locked.get(&id) {
            Some(locked) if locked.deleted => Err(Error::AccountNotFound(id)),
            Some(_) => Ok(()),
            None => self.tables.account_row(id).await.map(|_| ()),
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn get_account_for_update(&mut self, id: i64) -> Result<Account> {
        let locked = self.lock_row(id).await?;
        Ok(locked.row.to_account(locked.balance))
    }

    async fn add_account_balance(&mut self, id: i64, amount: i64) -> Result<Account> {
        let locked = self.lock_row(id).await?;
        locked.balance = locked
            .balance
            .checked_add(amount)
            .ok_or_else(|| Error::validation(format!("balance overflow on account {}", id)))?;
        Ok(locked.row.to_account(locked.balance))
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        self.ensure_account(params.account_id).await?;

        let entry = Entry {
            id: next_id(&self.tables.entry_seq),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        self.ensure_account(params.from_account_id).await?;
        self.ensure_account(params.to_account_id).await?;

        let transfer = Transfer {
            id: next_id(&self.tables.transfer_seq),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn delete_account(&mut self, id: i64) -> Result<()> {
        let locked = self.lock_row(id).await?;
        locked.deleted = true;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx {
            tables,
            locked,
            entries,
            transfers,
        } = *self;

        // Row guards stay held until the inserts below are done
        let mut guards = Vec::with_capacity(locked.len());
        let mut removed = Vec::new();
        for (id, mut held) in locked {
            if held.deleted {
                // Tombstone first so units queued on the row see it as gone
                held.guard.deleted = true;
                removed.push(id);
            } else {
                held.guard.balance = held.balance;
            }
            guards.push(held.guard);
        }

        if !removed.is_empty() {
            let mut accounts = tables.accounts.write().await;
            for id in &removed {
                accounts.remove(id);
            }
        }

        // Both ledger tables are held at once, always transfers first, so a
        // transfer never shows up without its entries.
        let mut transfer_table = tables.transfers.write().await;
        let mut entry_table = tables.entries.write().await;
        for transfer in transfers {
            transfer_table.insert(transfer.id, transfer);
        }
        for entry in entries {
            entry_table.insert(entry.id, entry);
        }

        drop(entry_table);
        drop(transfer_table);
        drop(guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn store_with_user(username: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_user(CreateUserParams {
                username: username.to_string(),
                hashed_password: "hash".to_string(),
                full_name: "Test User".to_string(),
                email: format!("{}@example.com", username),
            })
            .await
            .unwrap();
        store
    }

    async fn open_account(
        store: &MemoryStore,
        owner: &str,
        balance: i64,
        currency: &str,
    ) -> Account {
        store
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                balance,
                currency: currency.to_string(),
            })
            .await
            .unwrap()
    }

    async fn entries_of(store: &MemoryStore, account_id: i64) -> Vec<Entry> {
        store
            .list_entries(ListEntriesParams {
                account_id,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let store = store_with_user("alice").await;
        let account = open_account(&store, "alice", 100, "USD").await;

        let fetched = store.get_account(account.id).await.unwrap();
        assert_eq!(fetched, account);
        assert!(matches!(
            store.get_account(999).await,
            Err(Error::AccountNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_create_account_constraints() {
        let store = store_with_user("alice").await;
        open_account(&store, "alice", 0, "USD").await;

        let dup = store
            .create_account(CreateAccountParams {
                owner: "alice".to_string(),
                balance: 0,
                currency: "USD".to_string(),
            })
            .await;
        assert!(matches!(dup, Err(Error::AccountExists { .. })));

        let orphan = store
            .create_account(CreateAccountParams {
                owner: "bob".to_string(),
                balance: 0,
                currency: "USD".to_string(),
            })
            .await;
        assert!(matches!(orphan, Err(Error::UserNotFound(u)) if u == "bob"));
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = store_with_user("alice").await;
        let account = open_account(&store, "alice", 100, "USD").await;

        {
            let mut tx = store.begin().await.unwrap();
            let updated = tx.add_account_balance(account.id, 50).await.unwrap();
            assert_eq!(updated.balance, 150);
            tx.create_entry(CreateEntryParams {
                account_id: account.id,
                amount: 50,
            })
            .await
            .unwrap();
            // dropped without commit
        }

        assert_eq!(store.get_account(account.id).await.unwrap().balance, 100);
        assert!(entries_of(&store, account.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_relocking_same_row_is_idempotent() {
        let store = store_with_user("alice").await;
        let account = open_account(&store, "alice", 100, "USD").await;

        let mut tx = store.begin().await.unwrap();
        tx.get_account_for_update(account.id).await.unwrap();
        tx.add_account_balance(account.id, -30).await.unwrap();
        // Second lock returns the staged view instead of waiting on itself
        let again = tx.get_account_for_update(account.id).await.unwrap();
        assert_eq!(again.balance, 70);
        tx.commit().await.unwrap();

        assert_eq!(store.get_account(account.id).await.unwrap().balance, 70);
    }

    #[tokio::test]
    async fn test_delete_account() {
        let store = store_with_user("alice").await;
        let account = open_account(&store, "alice", 0, "EUR").await;

        // Staged until commit
        {
            let mut tx = store.begin().await.unwrap();
            tx.delete_account(account.id).await.unwrap();
            assert!(matches!(
                tx.get_account_for_update(account.id).await,
                Err(Error::AccountNotFound(_))
            ));
        }
        assert_eq!(store.get_account(account.id).await.unwrap(), account);

        let mut tx = store.begin().await.unwrap();
        tx.delete_account(account.id).await.unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(
            store.get_account(account.id).await,
            Err(Error::AccountNotFound(_))
        ));

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.delete_account(account.id).await,
            Err(Error::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_publishes_transfer_with_its_entries() {
        let store = store_with_user("alice").await;
        let a = open_account(&store, "alice", 100, "USD").await;
        let b = open_account(&store, "alice", 0, "EUR").await;

        let mut tx = store.begin().await.unwrap();
        let transfer = tx
            .create_transfer(CreateTransferParams {
                from_account_id: a.id,
                to_account_id: b.id,
                amount: 10,
            })
            .await
            .unwrap();
        for (account_id, amount) in [(a.id, -10), (b.id, 10)] {
            tx.create_entry(CreateEntryParams { account_id, amount })
                .await
                .unwrap();
        }

        // Keep the entries table busy so the commit stalls part way
        let entries_busy = store.tables.entries.read().await;
        let commit = tokio::spawn(async move { tx.commit().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let transfer_visible = store
            .tables
            .transfers
            .try_read()
            .map(|table| table.contains_key(&transfer.id))
            .unwrap_or(false);
        assert!(!transfer_visible, "transfer published before its entries");

        drop(entries_busy);
        commit.await.unwrap().unwrap();

        assert_eq!(store.get_transfer(transfer.id).await.unwrap(), transfer);
        let entries = entries_of(&store, a.id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, -10);
    }
}
