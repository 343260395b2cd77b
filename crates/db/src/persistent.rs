//! SQLite-backed ledger.

pub mod config;
pub mod constants;
pub mod errors;
pub mod sqlite;

pub use sqlite::{open_pool, SqliteLedger};
