//! Storage layer for divegps.
//!
//! This module provides `SQLite`-based persistent storage for location records
//! that could not be uploaded right away. Access to the connection is
//! serialized through an internal mutex so a capture and a batch upload can
//! share one [`Storage`] from different tasks. Batch runs are exclusive per
//! database file through a lease row in the `metadata` table, so two
//! processes sending from the same store cannot both hold it.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::record::LocationRecord;

/// `metadata` key of the batch lease. The value is `<holder>@<renewed_at_ms>`.
const BATCH_LEASE_KEY: &str = "batch_lease";

/// A lease not renewed for this long belongs to a run that died.
const BATCH_LEASE_TTL: Duration = Duration::from_secs(15 * 60);

static NEXT_LEASE_HOLDER: AtomicU64 = AtomicU64::new(0);

const SELECT_COLUMNS: &str = "SELECT id, latitude, longitude, timestamp, name, sent FROM location_records";

/// Storage engine for location records.
///
/// Records come back in ascending id order, which is insertion order.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets `status` and `list` read while another process uploads.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self::from_connection(path, conn))
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self::from_connection(path, conn))
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn: Mutex::new(conn),
        }
    }

    /// Close the database, flushing any pending state.
    ///
    /// Dropping a `Storage` also closes it but swallows errors.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` refuses to close the connection.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| Error::internal("storage connection lock poisoned"))?;
        conn.close().map_err(|(_, err)| Error::DatabaseQuery(err))?;
        debug!("Database at {} closed", self.path.display());
        Ok(())
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("storage connection lock poisoned"))
    }

    /// Persist a record and return it with its id assigned.
    ///
    /// A record that already carries an id is updated in place; its id never
    /// changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, or if the record
    /// carries an id that is not in the store.
    pub fn save(&self, record: &LocationRecord) -> Result<LocationRecord> {
        let conn = self.conn()?;

        if let Some(id) = record.id {
            let affected = conn.execute(
                r"
                UPDATE location_records
                SET latitude = ?1, longitude = ?2, timestamp = ?3, name = ?4, sent = ?5
                WHERE id = ?6
                ",
                params![
                    record.latitude,
                    record.longitude,
                    record.timestamp,
                    record.name,
                    record.sent,
                    id
                ],
            )?;
            if affected == 0 {
                return Err(Error::internal(format!("no stored record with id {id}")));
            }
            debug!("Updated record {}", id);
            return Ok(record.clone());
        }

        conn.execute(
            r"
            INSERT INTO location_records (latitude, longitude, timestamp, name, sent)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                record.latitude,
                record.longitude,
                record.timestamp,
                record.name,
                record.sent
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted record with id {}", id);
        Ok(LocationRecord {
            id: Some(id),
            ..record.clone()
        })
    }

    /// Get a record by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<LocationRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Get every stored record, sent or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all(&self) -> Result<Vec<LocationRecord>> {
        self.query_records(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
    }

    /// Get the records still waiting for upload.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn pending(&self) -> Result<Vec<LocationRecord>> {
        self.query_records(&format!("{SELECT_COLUMNS} WHERE sent = 0 ORDER BY id ASC"))
    }

    fn query_records(&self, sql: &str) -> Result<Vec<LocationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Delete a record by id.
    ///
    /// Returns `true` if a record was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()?
            .execute("DELETE FROM location_records WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Flag a record as accepted by the remote service.
    ///
    /// Returns `true` if a record was updated, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn mark_sent(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()?
            .execute("UPDATE location_records SET sent = 1 WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Count stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM location_records", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Claim the store for a batch upload.
    ///
    /// The claim lives in the database, so it excludes runs from other
    /// handles and other processes too. It is released when the guard drops.
    /// A lease that has not been renewed within 15 minutes is taken over.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchInProgress`] if another run holds a live lease.
    pub fn begin_batch(&self) -> Result<BatchGuard<'_>> {
        let holder = format!(
            "{}-{}",
            std::process::id(),
            NEXT_LEASE_HOLDER.fetch_add(1, Ordering::Relaxed)
        );
        let now = Utc::now().timestamp_millis();

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [BATCH_LEASE_KEY],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(lease) = existing {
            match parse_lease(&lease) {
                Some((owner, renewed_at)) if !lease_is_stale(renewed_at, now) => {
                    debug!("Batch lease held by {owner}");
                    return Err(Error::BatchInProgress);
                }
                Some((owner, _)) => warn!("Taking over stale batch lease held by {owner}"),
                None => warn!("Replacing unreadable batch lease {lease:?}"),
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![BATCH_LEASE_KEY, format_lease(&holder, now)],
        )?;
        tx.commit()?;

        debug!("Batch lease acquired by {holder}");
        Ok(BatchGuard {
            storage: self,
            holder,
        })
    }

    fn renew_batch(&self, holder: &str) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let affected = self.conn()?.execute(
            "UPDATE metadata SET value = ?2 WHERE key = ?1 AND value LIKE ?3",
            params![
                BATCH_LEASE_KEY,
                format_lease(holder, now),
                format!("{holder}@%")
            ],
        )?;
        Ok(affected > 0)
    }

    fn release_batch(&self, holder: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM metadata WHERE key = ?1 AND value LIKE ?2",
            params![BATCH_LEASE_KEY, format!("{holder}@%")],
        )?;
        Ok(())
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (total_records, pending_records, oldest, newest) = {
            let conn = self.conn()?;
            conn.query_row(
                r"
                SELECT COUNT(*), COALESCE(SUM(sent = 0), 0), MIN(timestamp), MAX(timestamp)
                FROM location_records
                ",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )?
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_records,
            pending_records,
            oldest_record: oldest.and_then(DateTime::from_timestamp_millis),
            newest_record: newest.and_then(DateTime::from_timestamp_millis),
            db_size_bytes,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<LocationRecord> {
        Ok(LocationRecord {
            id: Some(row.get(0)?),
            latitude: row.get(1)?,
            longitude: row.get(2)?,
            timestamp: row.get(3)?,
            name: row.get(4)?,
            sent: row.get(5)?,
        })
    }
}

fn format_lease(holder: &str, renewed_at: i64) -> String {
    format!("{holder}@{renewed_at}")
}

fn parse_lease(value: &str) -> Option<(&str, i64)> {
    let (holder, renewed_at) = value.rsplit_once('@')?;
    Some((holder, renewed_at.parse().ok()?))
}

fn lease_is_stale(renewed_at: i64, now: i64) -> bool {
    let ttl = i64::try_from(BATCH_LEASE_TTL.as_millis()).unwrap_or(i64::MAX);
    now.saturating_sub(renewed_at) > ttl
}

/// Exclusive claim on a store for the duration of a batch upload.
#[derive(Debug)]
pub struct BatchGuard<'a> {
    storage: &'a Storage,
    holder: String,
}

impl BatchGuard<'_> {
    /// Refresh the lease so other runs keep treating it as live.
    ///
    /// Returns `false` if the lease was taken over in the meantime.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn renew(&self) -> Result<bool> {
        self.storage.renew_batch(&self.holder)
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        match self.storage.release_batch(&self.holder) {
            Ok(()) => debug!("Batch lease released by {}", self.holder),
            Err(e) => error!("Could not release batch lease {}: {e}", self.holder),
        }
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of records stored.
    pub total_records: i64,
    /// Records not yet accepted by the remote service.
    pub pending_records: i64,
    /// Capture time of the oldest record.
    pub oldest_record: Option<DateTime<Utc>>,
    /// Capture time of the newest record.
    pub newest_record: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
