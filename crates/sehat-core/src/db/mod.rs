//! Database layer for the prescribing workflow.

mod schema;
mod doctors;
mod formulary;
mod interactions;
mod outbox;
mod patients;
mod prescriptions;

pub use schema::*;
#[allow(unused_imports)]
pub use doctors::*;
#[allow(unused_imports)]
pub use formulary::*;
#[allow(unused_imports)]
pub use interactions::*;
pub use outbox::*;
#[allow(unused_imports)]
pub use patients::*;
#[allow(unused_imports)]
pub use prescriptions::*;

pub(crate) use outbox::enqueue_notification;
pub(crate) use prescriptions::{insert_medication_row, insert_prescription_row};

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
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

    /// Create in-memory database (for testing).
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

    /// Begin a write transaction that takes SQLite's reserved lock up front,
    /// so concurrent submissions serialize instead of interleaving.
    pub fn write_transaction(&mut self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

/// Store a date as `YYYY-MM-DD`.
pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a `YYYY-MM-DD` column.
pub(crate) fn date_from_sql(column: &str, value: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| DbError::Constraint(format!("Invalid date in {}: {} ({})", column, value, e)))
}
