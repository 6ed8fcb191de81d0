//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use rand::Rng;
use tempfile::TempDir;

use ledgerline_core::adapters::duckdb::DuckDbRepository;
use ledgerline_core::adapters::memory::MemoryStore;
use ledgerline_core::ports::{
    CreateAccountParams, CreateUserParams, ListEntriesParams, ListTransfersParams, Store,
};
use ledgerline_core::{Account, Entry, Transfer, User};

pub const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

pub fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

pub fn random_owner() -> String {
    random_string(8)
}

pub fn random_money() -> i64 {
    rand::thread_rng().gen_range(0..=1000)
}

pub fn memory_store() -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}

/// A migrated DuckDB store in a fresh temp directory
///
/// Keep the returned `TempDir` alive for as long as the store is used.
pub async fn duckdb_store() -> (TempDir, Arc<dyn Store>) {
    let dir = TempDir::new().unwrap();
    let repo = DuckDbRepository::new(&dir.path().join("ledger.duckdb")).unwrap();
    repo.ensure_schema().await.unwrap();
    (dir, Arc::new(repo))
}

pub async fn create_random_user(store: &dyn Store) -> User {
    let username = random_owner();
    store
        .create_user(CreateUserParams {
            email: format!("{username}@example.com"),
            full_name: "Test User".to_string(),
            hashed_password: "$argon2id$placeholder".to_string(),
            username,
        })
        .await
        .unwrap()
}

/// A USD account with `balance`, owned by a fresh user
pub async fn create_account(store: &dyn Store, balance: i64) -> Account {
    let user = create_random_user(store).await;
    store
        .create_account(CreateAccountParams {
            owner: user.username,
            balance,
            currency: "USD".to_string(),
        })
        .await
        .unwrap()
}

pub async fn all_entries(store: &dyn Store, account_id: i64) -> Vec<Entry> {
    store
        .list_entries(ListEntriesParams {
            account_id,
            limit: 10_000,
            offset: 0,
        })
        .await
        .unwrap()
}

pub async fn all_transfers(store: &dyn Store, account_id: i64) -> Vec<Transfer> {
    store
        .list_transfers(ListTransfersParams {
            from_account_id: account_id,
            to_account_id: account_id,
            limit: 10_000,
            offset: 0,
        })
        .await
        .unwrap()
}

pub async fn balance(store: &dyn Store, account_id: i64) -> i64 {
    store.get_account(account_id).await.unwrap().balance
}
