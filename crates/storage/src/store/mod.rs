#![forbid(unsafe_code)]

mod patch;
mod profiles;
mod resources;
mod rows;
mod schema;

pub(crate) use patch::{ResourceColumn, ResourcePatch};
pub(crate) use profiles::*;
pub(crate) use resources::*;
pub(crate) use rows::*;

use crate::StoreError;
use crate::config::ManagerConfig;
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// Relational store: resource, attachment, link, object registry and profile
/// tables in one SQLite file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open_with_config(config: &ManagerConfig) -> Result<Self, StoreError> {
        Self::open_at(
            &config.storage_dir,
            &config.database_file,
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    fn open_at(
        storage_dir: &Path,
        database_file: &str,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        std::fs::create_dir_all(storage_dir)?;

        let conn = Connection::open(storage_dir.join(database_file))?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys = ON;")?;

        schema::preflight_gate(&conn)?;
        schema::install_schema(&conn)?;

        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Takes the write lock up front, so concurrent writers wait on the busy
    /// timeout instead of failing a read-to-write upgrade.
    pub(crate) fn write_tx(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
