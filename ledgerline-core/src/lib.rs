//! Ledgerline Core - banking ledger business logic
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Entry, Transfer, User)
//! - **ports**: Trait definitions for persistence (Store, StoreTx)
//! - **services**: Business logic orchestration (transfers, accounts, users)
//! - **adapters**: Concrete stores (DuckDB, in-memory)
//! - **token**: Signed access tokens

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;
pub mod token;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use ports::Store;
use services::{AccountService, TransferService, UserService};
use token::{JwtMaker, Maker};

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{Account, Entry, Transfer, User, UserProfile};
pub use token::{Payload, TokenError};

/// Main context for ledger operations
///
/// Holds the configuration, the store and every service built on it.
pub struct LedgerContext {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub account_service: AccountService,
    pub transfer_service: TransferService,
    pub user_service: UserService,
}

impl LedgerContext {
    /// Open the DuckDB ledger in `data_dir`, migrating it if needed
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        std::fs::create_dir_all(data_dir)?;

        let repository = DuckDbRepository::new(&data_dir.join(&config.db_filename))?;
        repository.ensure_schema().await?;

        Self::with_store(config, Arc::new(repository))
    }

    /// Build the services over an already opened store
    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Result<Self> {
        let maker: Arc<dyn Maker> = Arc::new(JwtMaker::new(config.require_token_key()?)?);

        Ok(Self {
            account_service: AccountService::new(Arc::clone(&store)),
            transfer_service: TransferService::new(Arc::clone(&store)),
            user_service: UserService::new(
                Arc::clone(&store),
                maker,
                config.access_token_duration,
            ),
            config,
            store,
        })
    }
}
