//! Database layer for wardflow.

mod schema;
mod bills;
mod catalog;
mod claims;
mod directory;
mod lab;
mod patients;
mod pharmacy;

pub use schema::*;
#[allow(unused_imports)]
pub use bills::*;
#[allow(unused_imports)]
pub use catalog::*;
#[allow(unused_imports)]
pub use claims::*;
#[allow(unused_imports)]
pub use directory::*;
#[allow(unused_imports)]
pub use lab::*;
#[allow(unused_imports)]
pub use patients::*;
#[allow(unused_imports)]
pub use pharmacy::*;

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
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
///
/// The default deployment is `open_in_memory`, matching the session-scoped
/// store of the original system; `open` gives optional file persistence.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create an in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction through a shared reference.
    ///
    /// Statements issued via other `Database` methods participate in the
    /// open transaction; dropping it without `commit` rolls everything back.
    pub fn begin(&self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Next sequential id for a prefixed id scheme, e.g. `BILL-<n>`.
    ///
    /// Derived from the maximum numeric suffix present in the table, so
    /// deleting or reordering rows cannot make future ids collide with live
    /// ones the way the legacy last-element scheme could.
    pub(crate) fn next_id(&self, table: &str, prefix: &str) -> DbResult<String> {
        // table and prefix are compile-time constants at every call site
        let sql = format!(
            "SELECT COALESCE(MAX(CAST(substr(id, {}) AS INTEGER)), 0) FROM {} WHERE id LIKE '{}%'",
            prefix.len() + 1,
            table,
            prefix
        );
        let max: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(format!("{}{}", prefix, max + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"patients".to_string()));
        assert!(tables.contains(&"bills".to_string()));
        assert!(tables.contains(&"lab_requests".to_string()));
        assert!(tables.contains(&"prescriptions".to_string()));
        assert!(tables.contains(&"hmo_claims".to_string()));
        assert!(tables.contains(&"medicines".to_string()));
        assert!(tables.contains(&"staff".to_string()));
    }

    #[test]
    fn test_next_id_from_empty_table() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.next_id("bills", "BILL-").unwrap(), "BILL-1");
    }

    #[test]
    fn test_rollback_on_drop() {
        let db = Database::open_in_memory().unwrap();
        {
            let tx = db.begin().unwrap();
            db.conn()
                .execute(
                    "INSERT INTO staff (id, name, role, active) VALUES ('STAFF-1', 'N', 'nurse', 1)",
                    [],
                )
                .unwrap();
            drop(tx); // no commit
        }
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM staff", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
