//! CLI command implementations

pub mod account;
pub mod entries;
pub mod init;
pub mod login;
pub mod logs;
pub mod transfer;
pub mod user;
pub mod whoami;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ledgerline_core::config::default_data_dir;
use ledgerline_core::services::{EntryPoint, LogEvent, LoggingService};
use ledgerline_core::{LedgerContext, Payload};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::debug!(error = %e, "failed to write event log");
        }
    }
}

/// Data directory from `LEDGERLINE_DIR` or `~/.ledgerline`
pub fn get_data_dir() -> Result<PathBuf> {
    default_data_dir()
}

/// Open the ledger in the data directory
pub async fn get_context() -> Result<LedgerContext> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    LedgerContext::new(&data_dir)
        .await
        .context("Failed to initialize ledger context")
}

/// Verify a bearer token and return its payload
pub fn authenticate(ctx: &LedgerContext, token: &str) -> Result<Payload> {
    let token = token.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    Ok(ctx.user_service.authenticate(token)?)
}
