//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core services
//! depend only on these traits, not on concrete implementations.

mod store;

pub use store::{
    CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    ListAccountsParams, ListEntriesParams, ListTransfersParams, Store, StoreTx,
    UpdateAccountParams, UpdateUserParams,
};
