//! Database layer for the center database.

mod schema;

pub mod donors;
pub mod invoices;
pub mod notifications;
pub mod partnerships;
pub mod stock;
pub mod users;

pub use schema::SCHEMA;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Serial id already exists: {serial_id}")]
    DuplicateSerial { serial_id: String },
}

pub type DbResult<T> = Result<T, DbError>;

/// Center database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating and provisioning the schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema. Idempotent.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction. Batch workflows run entirely inside one so that
    /// either every row moves or none does.
    pub fn transaction(&mut self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

// SQLite extended result codes for primary-key and unique violations.
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// Map a primary-key violation on a unit table to the structured duplicate
/// error carrying the offending serial id. Other constraint failures (CHECK,
/// foreign key) pass through unchanged.
pub(crate) fn map_serial_conflict(err: rusqlite::Error, serial_id: &str) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == SQLITE_CONSTRAINT_UNIQUE =>
        {
            DbError::DuplicateSerial {
                serial_id: serial_id.to_string(),
            }
        }
        _ => DbError::Sqlite(err),
    }
}
