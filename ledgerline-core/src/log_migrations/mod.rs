//! Migrations for logs.duckdb, embedded at compile time
//!
//! Kept apart from the ledger schema so the event log can be cleared or
//! deleted without touching ledger data.

/// (filename, sql) pairs in application order
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_sys_logs.sql", include_str!("001_sys_logs.sql")),
];
