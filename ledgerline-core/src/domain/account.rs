//! Account domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Currencies an account may be opened in
pub const SUPPORTED_CURRENCIES: &[&str] = &["USD", "EUR", "CAD"];

/// A balance-holding account owned by a user
///
/// Balances are integer currency units. The balance is only moved by the
/// transfer engine (or an explicit administrative update), never by callers
/// writing the field directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// Username of the owning user
    pub owner: String,
    pub balance: i64,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// Check that a currency code is one accounts can be opened in
    pub fn validate_currency(currency: &str) -> Result<String> {
        let normalized = Self::normalize_currency(currency);
        if SUPPORTED_CURRENCIES.contains(&normalized.as_str()) {
            Ok(normalized)
        } else {
            Err(Error::UnsupportedCurrency(currency.to_string()))
        }
    }
}
