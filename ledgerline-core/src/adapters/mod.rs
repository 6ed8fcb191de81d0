//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the Store port (file-backed, used by the CLI)
//! - An in-process store with per-row locks (tests, embedding)

pub mod duckdb;
pub mod memory;
