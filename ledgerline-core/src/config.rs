//! Configuration management
//!
//! Settings live in `settings.json` in the data directory:
//! ```json
//! {
//!   "ledger": {
//!     "environment": "development",
//!     "tokenSymmetricKey": "...",
//!     "accessTokenDuration": 900,
//!     "dbFilename": "ledgerline.duckdb"
//!   }
//! }
//! ```
//! Keys the ledger does not manage are preserved on save. Environment
//! variables win over the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Duration;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::token::MIN_SECRET_KEY_SIZE;

pub const ENV_DIR: &str = "LEDGERLINE_DIR";
pub const ENV_ENVIRONMENT: &str = "LEDGERLINE_ENVIRONMENT";
pub const ENV_TOKEN_SYMMETRIC_KEY: &str = "LEDGERLINE_TOKEN_SYMMETRIC_KEY";
pub const ENV_ACCESS_TOKEN_DURATION: &str = "LEDGERLINE_ACCESS_TOKEN_DURATION";

const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_DB_FILENAME: &str = "ledgerline.duckdb";
const DEFAULT_ACCESS_TOKEN_SECS: i64 = 15 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_symmetric_key: Option<String>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_filename: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Ledger configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    /// HMAC secret for access tokens; required before any token is issued
    pub token_symmetric_key: Option<String>,
    pub access_token_duration: Duration,
    pub db_filename: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            token_symmetric_key: None,
            access_token_duration: Duration::seconds(DEFAULT_ACCESS_TOKEN_SECS),
            db_filename: DEFAULT_DB_FILENAME.to_string(),
        }
    }
}

/// Data directory: `LEDGERLINE_DIR`, else `~/.ledgerline`
pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_DIR) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Cannot find home directory")?;
    Ok(home.join(".ledgerline"))
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid settings file {}", path.display()))
}

impl Config {
    /// Load settings.json from `data_dir`, then apply environment overrides
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(data_dir)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load settings.json only
    pub fn load_file(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(&data_dir.join("settings.json"))?.ledger;
        let defaults = Self::default();

        Ok(Self {
            environment: raw.environment.unwrap_or(defaults.environment),
            token_symmetric_key: raw.token_symmetric_key,
            access_token_duration: raw
                .access_token_duration
                .map(Duration::seconds)
                .unwrap_or(defaults.access_token_duration),
            db_filename: raw.db_filename.unwrap_or(defaults.db_filename),
        })
    }

    /// Override fields from whatever `lookup` returns for the `LEDGERLINE_*` keys
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(environment) = lookup(ENV_ENVIRONMENT) {
            self.environment = environment;
        }
        if let Some(key) = lookup(ENV_TOKEN_SYMMETRIC_KEY) {
            self.token_symmetric_key = Some(key);
        }
        if let Some(secs) = lookup(ENV_ACCESS_TOKEN_DURATION) {
            let secs: i64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{ENV_ACCESS_TOKEN_DURATION} must be whole seconds"))?;
            self.access_token_duration = Duration::seconds(secs);
        }
        Ok(())
    }

    /// Write managed fields to settings.json, keeping everything else intact
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");
        let mut settings = read_settings(&settings_path)?;

        settings.ledger.environment = Some(self.environment.clone());
        settings.ledger.token_symmetric_key = self.token_symmetric_key.clone();
        settings.ledger.access_token_duration = Some(self.access_token_duration.num_seconds());
        settings.ledger.db_filename = Some(self.db_filename.clone());

        std::fs::create_dir_all(data_dir)?;
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// The token key, or an error explaining how to set one
    pub fn require_token_key(&self) -> Result<&str> {
        match self.token_symmetric_key.as_deref() {
            Some(key) if key.len() >= MIN_SECRET_KEY_SIZE => Ok(key),
            Some(_) => bail!(
                "Token symmetric key must be at least {} characters",
                MIN_SECRET_KEY_SIZE
            ),
            None => bail!(
                "No token symmetric key configured. Run `lgl init` or set {}",
                ENV_TOKEN_SYMMETRIC_KEY
            ),
        }
    }

    /// A fresh random key of exactly the minimum size
    pub fn generate_token_key() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(MIN_SECRET_KEY_SIZE)
            .map(char::from)
            .collect()
    }
}
