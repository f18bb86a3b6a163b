//! # idopad-db
//!
//! Database access layer for the idopad daemon.
//! Manages the single SQLite database at `$IDOPAD_DATA_DIR/idopad.db`.
//!
//! ## Schema
//!
//! - WAL mode mandatory
//! - Foreign keys enforced
//! - All timestamps are Unix epoch seconds
//! - All monetary amounts are `rust_decimal::Decimal`, stored as TEXT
//! - Schema version stored in `PRAGMA user_version`

pub mod migrations;
pub mod queries;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("malformed stored amount: {0}")]
    Amount(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the idopad database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;",
    )?;
    Ok(())
}

/// Map a rusqlite error onto `DbError::Constraint` when it reports a
/// uniqueness or foreign-key violation, used by insert paths where a
/// duplicate row is a state-conflict error rather than an internal fault.
pub(crate) fn constraint(err: rusqlite::Error, what: &str) -> DbError {
    if let Some(code) = err.sqlite_error_code() {
        if code == rusqlite::ErrorCode::ConstraintViolation {
            return DbError::Constraint(what.to_string());
        }
    }
    DbError::Sqlite(err)
}
