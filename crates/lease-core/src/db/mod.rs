//! Database operations and SQLite management for plans and jobs.
//!
//! This module provides the synchronous, connection-level operations. The
//! async [`crate::store::Store`] wraps them for use from the scheduler tasks.

use std::path::Path;

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

pub mod import_queries;
pub mod job_queries;
pub mod plan_queries;
pub mod schema;

pub use import_queries::BatchImport;

/// Database connection and operations handler.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Creates a new database connection and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Checkpoints the write-ahead log and closes the connection, reporting
    /// any failure instead of swallowing it in `Drop`.
    pub fn close(self) -> Result<()> {
        self.connection
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .db_context("Failed to checkpoint write-ahead log")?;
        self.connection
            .close()
            .map_err(|(_, e)| e)
            .db_context("Failed to close database connection")
    }
}
