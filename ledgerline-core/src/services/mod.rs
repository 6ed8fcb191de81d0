//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
pub mod logging;
pub mod migration;
pub mod password;
mod transfer;
mod user;

pub use account::{AccountService, MAX_PAGE_SIZE};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use transfer::{TransferRequest, TransferService, TransferTxParams, TransferTxResult};
pub use user::{CreateUserRequest, LoginResult, UpdateUserRequest, UserService};
