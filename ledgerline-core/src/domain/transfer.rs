//! Transfer domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable record of money moving between two accounts
///
/// Every transfer is backed by exactly two entries: a debit on
/// `from_account_id` and a credit on `to_account_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Always positive
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}
