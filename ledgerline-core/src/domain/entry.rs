//! Entry domain model - one signed leg of a transfer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable ledger line recording a single balance change
///
/// Positive amounts credit the account, negative amounts debit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}
