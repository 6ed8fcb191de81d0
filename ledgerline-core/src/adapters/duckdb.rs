//! DuckDB repository implementation

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Entry, Transfer, User};
use crate::ports::{
    CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    ListAccountsParams, ListEntriesParams, ListTransfersParams, Store, StoreTx,
    UpdateAccountParams, UpdateUserParams,
};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";
const USER_COLUMNS: &str =
    "username, hashed_password, full_name, email, password_changed_at, created_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Error::database(e.to_string())
    }
}

/// DuckDB-backed ledger store
///
/// All access goes through one connection. A unit of work takes that
/// connection for itself between `BEGIN TRANSACTION` and `COMMIT`, so every
/// row it reads for update stays exclusively its own until it finishes.
pub struct DuckDbRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbRepository {
    /// Open (or create) a database file
    ///
    /// Retries with exponential backoff while another process holds the file.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Arc::new(Mutex::new(conn)),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("Failed to open database after {} retries", MAX_RETRIES)
        }))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn try_open_connection(db_path: &Path) -> anyhow::Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Run pending schema migrations
    pub async fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self.conn.lock().await;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.run_migrations().await?;
        Ok(())
    }
}

// === Row mapping ===

fn timestamp_col(row: &duckdb::Row, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

fn row_to_account(row: &duckdb::Row) -> duckdb::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        owner: row.get(1)?,
        balance: row.get(2)?,
        currency: row.get(3)?,
        created_at: timestamp_col(row, 4)?,
    })
}

fn row_to_entry(row: &duckdb::Row) -> duckdb::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        created_at: timestamp_col(row, 3)?,
    })
}

fn row_to_transfer(row: &duckdb::Row) -> duckdb::Result<Transfer> {
    Ok(Transfer {
        id: row.get(0)?,
        from_account_id: row.get(1)?,
        to_account_id: row.get(2)?,
        amount: row.get(3)?,
        created_at: timestamp_col(row, 4)?,
    })
}

fn row_to_user(row: &duckdb::Row) -> duckdb::Result<User> {
    let changed_at: Option<String> = row.get(4)?;
    let password_changed_at = changed_at
        .as_deref()
        .map(parse_timestamp)
        .transpose()
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(User {
        username: row.get(0)?,
        hashed_password: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        password_changed_at,
        created_at: timestamp_col(row, 5)?,
    })
}

fn optional<T>(result: duckdb::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// === Queries shared by the store and its units of work ===

fn account_by_id(conn: &Connection, id: i64) -> Result<Account> {
    optional(conn.query_row(
        &format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS),
        params![id],
        row_to_account,
    ))?
    .ok_or(Error::AccountNotFound(id))
}

fn account_exists(conn: &Connection, id: i64) -> Result<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE id = ?",
        params![id],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Err(Error::AccountNotFound(id));
    }
    Ok(())
}

fn add_balance(conn: &Connection, id: i64, amount: i64) -> Result<Account> {
    optional(conn.query_row(
        &format!(
            "UPDATE accounts SET balance = balance + ? WHERE id = ? RETURNING {}",
            ACCOUNT_COLUMNS
        ),
        params![amount, id],
        row_to_account,
    ))?
    .ok_or(Error::AccountNotFound(id))
}

fn insert_entry(conn: &Connection, params: CreateEntryParams) -> Result<Entry> {
    account_exists(conn, params.account_id)?;
    let entry = conn.query_row(
        &format!(
            "INSERT INTO entries (account_id, amount, created_at) VALUES (?, ?, ?) RETURNING {}",
            ENTRY_COLUMNS
        ),
        params![params.account_id, params.amount, Utc::now().to_rfc3339()],
        row_to_entry,
    )?;
    Ok(entry)
}

fn insert_transfer(conn: &Connection, params: CreateTransferParams) -> Result<Transfer> {
    account_exists(conn, params.from_account_id)?;
    account_exists(conn, params.to_account_id)?;
    let transfer = conn.query_row(
        &format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
             VALUES (?, ?, ?, ?) RETURNING {}",
            TRANSFER_COLUMNS
        ),
        params![
            params.from_account_id,
            params.to_account_id,
            params.amount,
            Utc::now().to_rfc3339()
        ],
        row_to_transfer,
    )?;
    Ok(transfer)
}

#[async_trait]
impl Store for DuckDbRepository {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(Box::new(DuckDbTx {
            conn,
            finished: false,
        }))
    }

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account> {
        let conn = self.conn.lock().await;

        let owner_exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?",
            params![params.owner],
            |row| row.get(0),
        )?;
        if owner_exists == 0 {
            return Err(Error::UserNotFound(params.owner));
        }

        let taken: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE owner = ? AND currency = ?",
            params![params.owner, params.currency],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(Error::AccountExists {
                owner: params.owner,
                currency: params.currency,
            });
        }

        let account = conn.query_row(
            &format!(
                "INSERT INTO accounts (owner, balance, currency, created_at)
                 VALUES (?, ?, ?, ?) RETURNING {}",
                ACCOUNT_COLUMNS
            ),
            params![
                params.owner,
                params.balance,
                params.currency,
                Utc::now().to_rfc3339()
            ],
            row_to_account,
        )?;
        Ok(account)
    }

    async fn get_account(&self, id: i64) -> Result<Account> {
        let conn = self.conn.lock().await;
        account_by_id(&conn, id)
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE owner = ? ORDER BY id LIMIT ? OFFSET ?",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map(
                params![params.owner, params.limit.max(0), params.offset.max(0)],
                row_to_account,
            )?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    async fn update_account(&self, params: UpdateAccountParams) -> Result<Account> {
        let conn = self.conn.lock().await;
        optional(conn.query_row(
            &format!(
                "UPDATE accounts SET balance = ? WHERE id = ? RETURNING {}",
                ACCOUNT_COLUMNS
            ),
            params![params.balance, params.id],
            row_to_account,
        ))?
        .ok_or(Error::AccountNotFound(params.id))
    }

    async fn get_entry(&self, id: i64) -> Result<Entry> {
        let conn = self.conn.lock().await;
        optional(conn.query_row(
            &format!("SELECT {} FROM entries WHERE id = ?", ENTRY_COLUMNS),
            params![id],
            row_to_entry,
        ))?
        .ok_or(Error::EntryNotFound(id))
    }

    async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries WHERE account_id = ? ORDER BY id LIMIT ? OFFSET ?",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(
                params![params.account_id, params.limit.max(0), params.offset.max(0)],
                row_to_entry,
            )?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    async fn get_transfer(&self, id: i64) -> Result<Transfer> {
        let conn = self.conn.lock().await;
        optional(conn.query_row(
            &format!("SELECT {} FROM transfers WHERE id = ?", TRANSFER_COLUMNS),
            params![id],
            row_to_transfer,
        ))?
        .ok_or(Error::TransferNotFound(id))
    }

    async fn list_transfers(&self, params: ListTransfersParams) -> Result<Vec<Transfer>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transfers
             WHERE from_account_id = ? OR to_account_id = ?
             ORDER BY id LIMIT ? OFFSET ?",
            TRANSFER_COLUMNS
        ))?;
        let transfers = stmt
            .query_map(
                params![
                    params.from_account_id,
                    params.to_account_id,
                    params.limit.max(0),
                    params.offset.max(0)
                ],
                row_to_transfer,
            )?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(transfers)
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<User> {
        let conn = self.conn.lock().await;

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?",
            params![params.username],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(Error::UserExists(params.username));
        }

        let user = conn.query_row(
            &format!(
                "INSERT INTO users (username, hashed_password, full_name, email, created_at)
                 VALUES (?, ?, ?, ?, ?) RETURNING {}",
                USER_COLUMNS
            ),
            params![
                params.username,
                params.hashed_password,
                params.full_name,
                params.email,
                Utc::now().to_rfc3339()
            ],
            row_to_user,
        )?;
        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<User> {
        let conn = self.conn.lock().await;
        optional(conn.query_row(
            &format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS),
            params![username],
            row_to_user,
        ))?
        .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }

    async fn update_user(&self, params: UpdateUserParams) -> Result<User> {
        let conn = self.conn.lock().await;
        let password_changed_at = params
            .hashed_password
            .as_ref()
            .map(|_| Utc::now().to_rfc3339());

        optional(conn.query_row(
            &format!(
                "UPDATE users SET
                    hashed_password = COALESCE(CAST(? AS VARCHAR), hashed_password),
                    password_changed_at = COALESCE(CAST(? AS VARCHAR), password_changed_at),
                    full_name = COALESCE(CAST(? AS VARCHAR), full_name),
                    email = COALESCE(CAST(? AS VARCHAR), email)
                 WHERE username = ?
                 RETURNING {}",
                USER_COLUMNS
            ),
            params![
                params.hashed_password,
                password_changed_at,
                params.full_name,
                params.email,
                params.username
            ],
            row_to_user,
        ))?
        .ok_or_else(|| Error::UserNotFound(params.username.clone()))
    }
}

/// Unit of work over a [`DuckDbRepository`]
///
/// Rolls back on drop unless committed.
pub struct DuckDbTx {
    conn: OwnedMutexGuard<Connection>,
    finished: bool,
}

#[async_trait]
impl StoreTx for DuckDbTx {
    async fn get_account_for_update(&mut self, id: i64) -> Result<Account> {
        // The unit owns the connection, so a plain read is already exclusive
        account_by_id(&self.conn, id)
    }

    async fn add_account_balance(&mut self, id: i64, amount: i64) -> Result<Account> {
        add_balance(&self.conn, id, amount)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        insert_entry(&self.conn, params)
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        insert_transfer(&self.conn, params)
    }

    async fn delete_account(&mut self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM accounts WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::AccountNotFound(id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.finished = true;
        if let Err(e) = this.conn.execute_batch("COMMIT") {
            if let Err(rollback_err) = this.conn.execute_batch("ROLLBACK") {
                warn!(error = %rollback_err, "rollback after failed commit failed");
            }
            return Err(Error::aborted(e.to_string()));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.finished = true;
        this.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for DuckDbTx {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo_with_user(username: &str) -> DuckDbRepository {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().await.unwrap();
        repo.create_user(CreateUserParams {
            username: username.to_string(),
            hashed_password: "hash".to_string(),
            full_name: "Test User".to_string(),
            email: format!("{}@example.com", username),
        })
        .await
        .unwrap();
        repo
    }

    #[tokio::test]
    async fn test_account_round_trip() {
        let repo = repo_with_user("alice").await;
        let account = repo
            .create_account(CreateAccountParams {
                owner: "alice".to_string(),
                balance: 42,
                currency: "USD".to_string(),
            })
            .await
            .unwrap();

        let fetched = repo.get_account(account.id).await.unwrap();
        assert_eq!(fetched, account);

        let updated = repo
            .update_account(UpdateAccountParams {
                id: account.id,
                balance: 7,
            })
            .await
            .unwrap();
        assert_eq!(updated.balance, 7);

        let mut tx = repo.begin().await.unwrap();
        tx.delete_account(account.id).await.unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(
            repo.get_account(account.id).await,
            Err(Error::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_abandoned_unit_rolls_back() {
        let repo = repo_with_user("alice").await;
        let account = repo
            .create_account(CreateAccountParams {
                owner: "alice".to_string(),
                balance: 100,
                currency: "USD".to_string(),
            })
            .await
            .unwrap();

        {
            let mut tx = repo.begin().await.unwrap();
            let updated = tx.add_account_balance(account.id, -40).await.unwrap();
            assert_eq!(updated.balance, 60);
        }

        assert_eq!(repo.get_account(account.id).await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_update_user_partial() {
        let repo = repo_with_user("alice").await;

        let updated = repo
            .update_user(UpdateUserParams {
                username: "alice".to_string(),
                full_name: Some("Alice Liddell".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Alice Liddell");
        assert_eq!(updated.email, "alice@example.com");
        assert!(updated.password_changed_at.is_none());

        let updated = repo
            .update_user(UpdateUserParams {
                username: "alice".to_string(),
                hashed_password: Some("new-hash".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.hashed_password, "new-hash");
        assert!(updated.password_changed_at.is_some());
    }
}
