//! Core domain entities
//!
//! Plain data records and their validation rules - no I/O.

mod account;
mod entry;
mod transfer;
mod user;
pub mod result;

pub use account::{Account, SUPPORTED_CURRENCIES};
pub use entry::Entry;
pub use transfer::Transfer;
pub use user::{User, UserProfile};
