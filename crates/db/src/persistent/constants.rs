//! Defaults of the persistence layer.

use std::time::Duration;

/// Connections kept in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// How long sqlite itself waits on a locked database before reporting it busy.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Retries of a statement that still failed with a busy error.
pub const DEFAULT_BUSY_RETRIES: usize = 5;

/// Pause between those retries.
pub const DEFAULT_BUSY_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Name of the database file inside the data directory.
pub const DB_FILE_NAME: &str = "relayer.db";
