//! Result and error types for the core library

use thiserror::Error;

use crate::token::TokenError;

/// Core library error type
///
/// Callers branch on the variant; the messages are for humans only.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {amount}")]
    InsufficientFunds {
        account_id: i64,
        balance: i64,
        amount: i64,
    },

    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(i64),

    #[error("Transfer amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Account {account_id} currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        expected: String,
        actual: String,
    },

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("User {owner} already has a {currency} account")]
    AccountExists { owner: String, currency: String },

    #[error("Account {account_id} doesn't belong to {username}")]
    AccountNotOwned { account_id: i64, username: String },

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(i64),

    #[error("Transfer not found: {0}")]
    TransferNotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a transaction aborted error
    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::TransactionAborted(msg.into())
    }

    /// Stable snake_case name of the variant, free of user data
    pub fn kind(&self) -> &'static str {
        match self {
            Error::AccountNotFound(_) => "account_not_found",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::TransactionAborted(_) => "transaction_aborted",
            Error::SameAccount(_) => "same_account",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::CurrencyMismatch { .. } => "currency_mismatch",
            Error::UnsupportedCurrency(_) => "unsupported_currency",
            Error::AccountExists { .. } => "account_exists",
            Error::AccountNotOwned { .. } => "account_not_owned",
            Error::UserNotFound(_) => "user_not_found",
            Error::UserExists(_) => "user_exists",
            Error::IncorrectPassword => "incorrect_password",
            Error::PermissionDenied(_) => "permission_denied",
            Error::PasswordHash(_) => "password_hash",
            Error::EntryNotFound(_) => "entry_not_found",
            Error::TransferNotFound(_) => "transfer_not_found",
            Error::Validation(_) => "validation",
            Error::Database(_) => "database",
            Error::Token(TokenError::InvalidToken) => "invalid_token",
            Error::Token(TokenError::ExpiredToken) => "expired_token",
            Error::Token(_) => "token",
        }
    }

    /// True for errors caused by the request rather than the system
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Error::TransactionAborted(_)
                | Error::Database(_)
                | Error::PasswordHash(_)
                | Error::Token(TokenError::Signing(_))
                | Error::Token(TokenError::PayloadCreation(_))
        )
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
