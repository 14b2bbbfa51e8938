//! # Velocast Warehouse
//!
//! DuckDB-backed persistence for the sprint velocity history.
//!
//! ## Overview
//!
//! [`HistoryWarehouse`] implements [`velocast_core::HistoryStore`]. A merge
//! cycle runs entirely inside one [`WarehouseSession`]:
//!
//! 1. an exclusive advisory lock on `<db>.lock` is taken without waiting
//! 2. the schema is migrated and the current rows are read in log order
//! 3. the merged log replaces the table inside a single transaction
//!
//! A failed write rolls back, so readers only ever see a complete log.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use velocast_warehouse::{HistoryWarehouse, WarehouseConfig};
//!
//! let warehouse = HistoryWarehouse::open(WarehouseConfig::default())?;
//! let log = velocast_core::history::load(&warehouse)?;
//! println!("{} sprints on record", log.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `sprint_history` | One row per completed sprint, ordered by `seq` |
//! | `schema_migrations` | Applied migration versions |

pub mod connection;
pub mod lock;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, ToSql};
use thiserror::Error;
use velocast_core::{HistoryStore, StoreError, UtcDateTime, ValidationError, VelocityRecord};

pub use lock::HistoryLock;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error, including lock contention.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored row no longer forms a valid velocity record.
    #[error("stored history row for sprint {sprint_id} is invalid: {source}")]
    InvalidRow {
        sprint_id: u64,
        #[source]
        source: ValidationError,
    },
}

/// Configuration for the history database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for velocast data.
    pub velocast_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let velocast_home = resolve_velocast_home();
        let db_path = velocast_home.join("history.duckdb");
        Self {
            velocast_home,
            db_path,
        }
    }
}

impl WarehouseConfig {
    /// Store the database at an explicit path.
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let velocast_home = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            velocast_home,
            db_path,
        }
    }

    /// Sibling file used for the exclusive lock.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.db_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }
}

/// Locked connection for one load-merge-write cycle.
///
/// Fields drop in declaration order, so the connection closes before the
/// lock is released.
pub struct WarehouseSession {
    connection: Connection,
    lock: HistoryLock,
}

/// The history store backed by a single `DuckDB` file.
#[derive(Debug, Clone)]
pub struct HistoryWarehouse {
    config: WarehouseConfig,
}

impl HistoryWarehouse {
    /// Open a warehouse at the configured path.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Take the lock and open a migrated read-write connection.
    ///
    /// # Errors
    /// Returns [`WarehouseError::Io`] with [`std::io::ErrorKind::WouldBlock`]
    /// when another process holds the lock.
    pub fn session(&self) -> Result<WarehouseSession, WarehouseError> {
        let lock = HistoryLock::acquire(&self.config.lock_path())?;
        let connection = connection::open_connection(&self.config.db_path)?;
        migrations::apply_migrations(&connection)?;
        tracing::debug!(db = %self.config.db_path.display(), "history session opened");
        Ok(WarehouseSession { connection, lock })
    }

    /// Read the stored log in persisted order.
    pub fn read_records(
        &self,
        session: &WarehouseSession,
    ) -> Result<Vec<VelocityRecord>, WarehouseError> {
        let mut statement = session.connection.prepare(
            "SELECT sprint_id, sprint_name, start_date, end_date, achieved_points, \
             achieved_seconds, duration_days, available_days \
             FROM sprint_history ORDER BY seq",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(StoredRow {
                sprint_id: row.get(0)?,
                sprint_name: row.get(1)?,
                start_date: row.get(2)?,
                end_date: row.get(3)?,
                achieved_points: row.get(4)?,
                achieved_seconds: row.get(5)?,
                duration_days: row.get(6)?,
                available_days: row.get(7)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Replace the stored log with `records` in one transaction.
    pub fn replace_records(
        &self,
        session: &WarehouseSession,
        records: &[VelocityRecord],
    ) -> Result<(), WarehouseError> {
        let connection = &session.connection;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            connection.execute_batch("DELETE FROM sprint_history")?;
            for (seq, record) in records.iter().enumerate() {
                let seq = i64::try_from(seq).unwrap_or(i64::MAX);
                let start = record.start.map(UtcDateTime::format_rfc3339);
                let end = record.end.format_rfc3339();
                let params: [&dyn ToSql; 9] = [
                    &record.sprint_id,
                    &record.sprint_name,
                    &start,
                    &end,
                    &record.achieved_points,
                    &record.achieved_seconds,
                    &record.duration_days,
                    &record.available_days,
                    &seq,
                ];
                connection.execute(
                    "INSERT INTO sprint_history \
                     (sprint_id, sprint_name, start_date, end_date, achieved_points, \
                      achieved_seconds, duration_days, available_days, seq) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params.as_slice(),
                )?;
            }
            Ok(())
        })();

        finalize_transaction(connection, result)?;
        tracing::debug!(rows = records.len(), "history table rewritten");
        Ok(())
    }
}

impl HistoryStore for HistoryWarehouse {
    type Lock = WarehouseSession;

    fn lock(&self) -> Result<Self::Lock, StoreError> {
        Ok(self.session()?)
    }

    fn load(&self, lock: &Self::Lock) -> Result<Vec<VelocityRecord>, StoreError> {
        Ok(self.read_records(lock)?)
    }

    fn write(&self, lock: &Self::Lock, records: &[VelocityRecord]) -> Result<(), StoreError> {
        Ok(self.replace_records(lock, records)?)
    }
}

struct StoredRow {
    sprint_id: u64,
    sprint_name: String,
    start_date: Option<String>,
    end_date: String,
    achieved_points: f64,
    achieved_seconds: u64,
    duration_days: Option<f64>,
    available_days: Option<f64>,
}

impl StoredRow {
    fn into_record(self) -> Result<VelocityRecord, WarehouseError> {
        let sprint_id = self.sprint_id;
        let invalid = |source| WarehouseError::InvalidRow { sprint_id, source };

        let start = self
            .start_date
            .as_deref()
            .map(UtcDateTime::parse)
            .transpose()
            .map_err(invalid)?;
        let end = UtcDateTime::parse(&self.end_date).map_err(invalid)?;

        VelocityRecord::new(
            sprint_id,
            self.sprint_name,
            start,
            end,
            self.achieved_points,
            self.achieved_seconds,
            self.duration_days,
            self.available_days,
        )
        .map_err(invalid)
    }
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = connection.execute_batch("ROLLBACK") {
                tracing::warn!(%rollback_error, %error, "history rollback failed");
            }
            Err(error)
        }
    }
}

/// Resolve the velocast home directory from environment or default.
fn resolve_velocast_home() -> PathBuf {
    if let Some(path) = env::var_os("VELOCAST_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".velocast");
    }

    PathBuf::from(".velocast")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: u64, end: &str, points: f64) -> VelocityRecord {
        let end = UtcDateTime::parse(end).expect("end");
        VelocityRecord::new(id, format!("Sprint {id}"), None, end, points, 3_600, Some(14.0), None)
            .expect("record")
    }

    #[test]
    fn lock_path_sits_next_to_database() {
        let config = WarehouseConfig::at("/tmp/velocast/history.duckdb");
        assert_eq!(config.lock_path(), PathBuf::from("/tmp/velocast/history.duckdb.lock"));
        assert_eq!(config.velocast_home, PathBuf::from("/tmp/velocast"));
    }

    #[test]
    fn stores_and_reloads_records_in_order() {
        let temp = tempdir().expect("tempdir");
        let warehouse =
            HistoryWarehouse::open(WarehouseConfig::at(temp.path().join("nested").join("h.duckdb")))
                .expect("open");

        let session = warehouse.session().expect("session");
        assert!(warehouse.read_records(&session).expect("empty").is_empty());

        let records = vec![
            record(2, "2024-01-14T00:00:00Z", 10.0),
            record(5, "2024-01-28T00:00:00Z", 12.5),
        ];
        warehouse.replace_records(&session, &records).expect("write");
        assert_eq!(warehouse.read_records(&session).expect("reload"), records);
    }

    #[test]
    fn optional_fields_survive_storage() {
        let temp = tempdir().expect("tempdir");
        let warehouse =
            HistoryWarehouse::open(WarehouseConfig::at(temp.path().join("h.duckdb"))).expect("open");
        let start = UtcDateTime::parse("2024-03-01T09:00:00Z").expect("start");
        let end = UtcDateTime::parse("2024-03-15T17:00:00Z").expect("end");
        let full = VelocityRecord::new(9, "S9", Some(start), end, 8.0, 0, None, Some(30.0))
            .expect("record");

        let session = warehouse.session().expect("session");
        warehouse.replace_records(&session, &[full.clone()]).expect("write");
        assert_eq!(warehouse.read_records(&session).expect("reload"), vec![full]);
    }

    #[test]
    fn failed_rollback_still_reports_the_original_error() {
        let connection = Connection::open_in_memory().expect("in-memory db");
        let original = WarehouseError::InvalidRow {
            sprint_id: 4,
            source: ValidationError::InvalidAvailability { value: String::from("-1") },
        };

        // No transaction is open, so ROLLBACK itself fails.
        let error = finalize_transaction::<()>(&connection, Err(original)).expect_err("error");

        assert!(matches!(error, WarehouseError::InvalidRow { sprint_id: 4, .. }));
    }
}
