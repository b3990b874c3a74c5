//! Partner-organization database.
//!
//! Each partner organization runs its own small SQLite database holding the
//! mail records addressed to it and a display mirror of its blood-drive
//! appointments. The regional center writes here through a separate
//! connection; there is no distributed transaction between this database and
//! the center's, so callers must treat a failed write here as a delivery
//! failure, not as a reason to roll back center-side state.

pub mod appointments;
pub mod mail;

mod schema;

pub use appointments::AppointmentDisplay;
pub use mail::{MailCategory, MailRecord};

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Organization database errors.
#[derive(Error, Debug)]
pub enum OrgDbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type OrgDbResult<T> = Result<T, OrgDbError>;

/// Connection wrapper for one organization's database.
pub struct OrgDatabase {
    conn: Connection,
}

impl OrgDatabase {
    /// Open the organization database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> OrgDbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> OrgDbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> OrgDbResult<()> {
        self.conn.execute_batch(schema::ORG_SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = OrgDatabase::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = OrgDatabase::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"mail_records".to_string()));
        assert!(tables.contains(&"appointments".to_string()));
    }

    #[test]
    fn test_open_file_backed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org.db");

        {
            let db = OrgDatabase::open(&path).unwrap();
            let record = MailRecord::decision_notice(
                "Northern Lifeline",
                "req-1",
                true,
                None,
                "2026-08-20",
            );
            db.insert_mail_record(&record).unwrap();
        }

        // Reopen and verify persistence
        let db = OrgDatabase::open(&path).unwrap();
        let records = db.list_mail_records("Northern Lifeline").unwrap();
        assert_eq!(records.len(), 1);
    }
}
