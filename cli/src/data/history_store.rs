//! Append-only battery level history.
//!
//! SQLite in WAL mode. A single write connection lives behind a mutex and is
//! handed out as a [`HistoryWriter`] guard; readers open their own read-only
//! connections through [`HistoryStore::reader`]. Both close on drop, so a
//! handle is released on every exit path.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytesize::ByteSize;
use chrono::Utc;
use gauge_protocol::{BatteryHealth, BatteryStatus, HistoryEntry, PluggedSource};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::data_dir;

/// Six-column `battery_log` with `schema_version` tracking.
const CURRENT_SCHEMA_VERSION: i32 = 2;
/// `battery_log(time_stamp, battery_level)` without version tracking.
const LEGACY_SCHEMA_VERSION: i32 = 1;
const DATABASE_NAME: &str = "history.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

const SELECT_COLUMNS: &str =
    "SELECT time_stamp, battery_level, status, plugged, voltage, health FROM battery_log";

#[derive(Debug, thiserror::Error)]
pub enum HistoryStoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("An entry already exists for timestamp {0}")]
    DuplicateKey(i64),
}

pub type Result<T> = std::result::Result<T, HistoryStoreError>;

pub struct HistoryStore {
    path: PathBuf,
    writer: Mutex<Connection>,
}

impl HistoryStore {
    /// Open or create the history database in the data directory
    pub fn open() -> Result<Self> {
        let dir = data_dir();
        std::fs::create_dir_all(&dir)?;
        Self::open_at(dir.join(DATABASE_NAME))
    }

    /// Like [`HistoryStore::open`], but an unusable database is logged and
    /// yields `None` so callers can carry on without history.
    pub fn open_or_log() -> Option<Self> {
        Self::log_unavailable(Self::open())
    }

    fn log_unavailable(opened: Result<Self>) -> Option<Self> {
        match opened {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "History store unavailable, level changes will not be recorded");
                None
            }
        }
    }

    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;

        initialize_schema(&mut conn)?;

        Ok(Self {
            path,
            writer: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the single write connection. Blocks while another writer holds it.
    pub fn writer(&self) -> HistoryWriter<'_> {
        // Statements are atomic, a poisoned lock still guards a usable connection.
        let conn = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        HistoryWriter { conn }
    }

    pub fn reader(&self) -> Result<HistoryReader> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(HistoryReader { conn })
    }

    pub fn append(&self, entry: &HistoryEntry) -> Result<i64> {
        self.writer().append(entry)
    }

    /// Every entry, oldest first. Each call re-scans from the start.
    pub fn query(&self) -> Result<Vec<HistoryEntry>> {
        self.reader()?.entries()
    }

    /// Database file size in bytes, WAL excluded.
    pub fn size_bytes(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    pub fn stats(&self) -> Result<HistoryStats> {
        let reader = self.reader()?;
        let (oldest, newest) = reader.bounds()?;

        Ok(HistoryStats {
            entry_count: reader.count()?,
            oldest,
            newest,
            size_bytes: self.size_bytes()?,
        })
    }
}

/// Scoped write access. The connection returns to the store when dropped.
pub struct HistoryWriter<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl HistoryWriter<'_> {
    /// Insert an entry keyed by its timestamp. The first entry for a
    /// timestamp wins; later ones come back as [`HistoryStoreError::DuplicateKey`].
    pub fn append(&self, entry: &HistoryEntry) -> Result<i64> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO battery_log (time_stamp, battery_level, status, plugged, voltage, health)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.timestamp,
                entry.level,
                entry.status.code(),
                entry.plugged.code(),
                entry.voltage,
                entry.health.code(),
            ],
        )?;

        if inserted == 0 {
            return Err(HistoryStoreError::DuplicateKey(entry.timestamp));
        }

        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete_before(&self, before: i64) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM battery_log WHERE time_stamp < ?", [before])?;
        Ok(deleted)
    }

    pub fn clear(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM battery_log", [])?;
        Ok(deleted)
    }

    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute("VACUUM", [])?;
        Ok(())
    }
}

/// Read-only connection, closed on drop.
pub struct HistoryReader {
    conn: Connection,
}

impl HistoryReader {
    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        self.collect(&format!("{SELECT_COLUMNS} ORDER BY time_stamp ASC"), [])
    }

    /// Entries at or after `since`, oldest first.
    pub fn entries_since(&self, since: i64) -> Result<Vec<HistoryEntry>> {
        self.collect(
            &format!("{SELECT_COLUMNS} WHERE time_stamp >= ? ORDER BY time_stamp ASC"),
            [since],
        )
    }

    /// The newest `limit` entries, still oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = self.collect(
            &format!("{SELECT_COLUMNS} ORDER BY time_stamp DESC LIMIT ?"),
            [limit as i64],
        )?;
        entries.reverse();
        Ok(entries)
    }

    pub fn latest(&self) -> Result<Option<HistoryEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} ORDER BY time_stamp DESC LIMIT 1"),
                [],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM battery_log", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Oldest and newest timestamps, `None` when empty.
    pub fn bounds(&self) -> Result<(Option<i64>, Option<i64>)> {
        let bounds = self.conn.query_row(
            "SELECT MIN(time_stamp), MAX(time_stamp) FROM battery_log",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(bounds)
    }

    fn collect<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(params, entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        timestamp: row.get(0)?,
        level: row.get(1)?,
        status: BatteryStatus::from_code(row.get(2)?),
        plugged: PluggedSource::from_code(row.get(3)?),
        voltage: row.get(4)?,
        health: BatteryHealth::from_code(row.get(5)?),
    })
}

fn initialize_schema(conn: &mut Connection) -> Result<()> {
    let version = schema_version(conn)?;

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    if version > CURRENT_SCHEMA_VERSION {
        warn!(
            version,
            current = CURRENT_SCHEMA_VERSION,
            "History database was written by a newer version, using it as-is"
        );
        return Ok(());
    }

    if version == 0 {
        debug!("Creating history schema");
    } else {
        info!(
            from = version,
            to = CURRENT_SCHEMA_VERSION,
            "Upgrading history schema, existing history is dropped"
        );
    }

    recreate_schema(conn)
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// 0 for an empty database.
fn schema_version(conn: &Connection) -> Result<i32> {
    if !table_exists(conn, "schema_version")? {
        if table_exists(conn, "battery_log")? {
            return Ok(LEGACY_SCHEMA_VERSION);
        }
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

fn recreate_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        r#"
        DROP TABLE IF EXISTS battery_log;
        DROP TABLE IF EXISTS schema_version;

        CREATE TABLE schema_version (
            version INTEGER NOT NULL
        );

        CREATE TABLE battery_log (
            time_stamp INTEGER PRIMARY KEY,
            battery_level INTEGER NOT NULL,
            status INTEGER NOT NULL DEFAULT 1,
            plugged INTEGER NOT NULL DEFAULT 0,
            voltage INTEGER NOT NULL DEFAULT -1,
            health INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )?;

    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    tx.commit()?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStats {
    pub entry_count: i64,
    pub oldest: Option<i64>,
    pub newest: Option<i64>,
    pub size_bytes: u64,
}

impl HistoryStats {
    pub fn size_formatted(&self) -> String {
        ByteSize::b(self.size_bytes).to_string()
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Cutoff timestamp for entries older than `days` before `now`.
pub fn days_before(now: i64, days: u32) -> i64 {
    now - days as i64 * MILLIS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauge_protocol::UNAVAILABLE;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open_at(dir.path().join(DATABASE_NAME)).unwrap();
        (dir, store)
    }

    fn entry(timestamp: i64, level: i32) -> HistoryEntry {
        HistoryEntry {
            timestamp,
            level,
            status: BatteryStatus::Discharging,
            plugged: PluggedSource::None,
            voltage: 3_900,
            health: BatteryHealth::Good,
        }
    }

    #[test]
    fn test_garbage_database_is_reported_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_NAME);
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();

        assert!(HistoryStore::open_at(&path).is_err());
        assert!(HistoryStore::log_unavailable(HistoryStore::open_at(&path)).is_none());

        let good = dir.path().join("good.db");
        assert!(HistoryStore::log_unavailable(HistoryStore::open_at(good)).is_some());
    }

    #[test]
    fn test_append_returns_timestamp_as_row_id() {
        let (_dir, store) = open_temp();
        assert_eq!(store.append(&entry(1_000, 80)).unwrap(), 1_000);
        assert_eq!(store.query().unwrap(), vec![entry(1_000, 80)]);
    }

    #[test]
    fn test_duplicate_timestamp_keeps_first() {
        let (_dir, store) = open_temp();
        store.append(&entry(5_000, 61)).unwrap();

        let err = store.append(&entry(5_000, 12)).unwrap_err();
        assert!(matches!(err, HistoryStoreError::DuplicateKey(5_000)));

        let entries = store.query().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, 61);
    }

    #[test]
    fn test_query_is_ascending_regardless_of_insert_order() {
        let (_dir, store) = open_temp();
        for ts in [30, 10, 50, 20, 40] {
            store.append(&entry(ts, ts as i32)).unwrap();
        }

        let timestamps: Vec<i64> = store.query().unwrap().iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30, 40, 50]);

        // A second scan starts over.
        assert_eq!(store.query().unwrap().len(), 5);
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_NAME);

        {
            let store = HistoryStore::open_at(&path).unwrap();
            store.append(&entry(1, 10)).unwrap();
        }

        let store = HistoryStore::open_at(&path).unwrap();
        assert_eq!(store.query().unwrap(), vec![entry(1, 10)]);
    }

    #[test]
    fn test_legacy_schema_is_dropped_and_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_NAME);

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE battery_log (time_stamp INTEGER PRIMARY KEY, battery_level INTEGER);
                 INSERT INTO battery_log VALUES (100, 40);
                 INSERT INTO battery_log VALUES (200, 41);",
            )
            .unwrap();
        }

        let store = HistoryStore::open_at(&path).unwrap();
        assert!(store.query().unwrap().is_empty());

        store.append(&entry(300, 42)).unwrap();
        assert_eq!(store.query().unwrap(), vec![entry(300, 42)]);
    }

    #[test]
    fn test_older_version_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_NAME);

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE schema_version (version INTEGER NOT NULL);
                 INSERT INTO schema_version VALUES (1);
                 CREATE TABLE battery_log (time_stamp INTEGER PRIMARY KEY, battery_level INTEGER);
                 INSERT INTO battery_log VALUES (100, 40);",
            )
            .unwrap();
        }

        let store = HistoryStore::open_at(&path).unwrap();
        assert!(store.query().unwrap().is_empty());
    }

    #[test]
    fn test_reader_queries() {
        let (_dir, store) = open_temp();
        for (ts, level) in [(10, 90), (20, 85), (30, 80), (40, 75)] {
            store.append(&entry(ts, level)).unwrap();
        }

        let reader = store.reader().unwrap();
        assert_eq!(reader.count().unwrap(), 4);
        assert_eq!(reader.bounds().unwrap(), (Some(10), Some(40)));
        assert_eq!(reader.latest().unwrap(), Some(entry(40, 75)));

        let since: Vec<i64> = reader
            .entries_since(20)
            .unwrap()
            .iter()
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(since, vec![20, 30, 40]);

        let recent: Vec<i64> = reader.recent(2).unwrap().iter().map(|e| e.timestamp).collect();
        assert_eq!(recent, vec![30, 40]);
    }

    #[test]
    fn test_empty_store_reads() {
        let (_dir, store) = open_temp();
        let reader = store.reader().unwrap();
        assert_eq!(reader.latest().unwrap(), None);
        assert_eq!(reader.bounds().unwrap(), (None, None));

        let stats = store.stats().unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.oldest, None);
    }

    #[test]
    fn test_delete_before_and_clear() {
        let (_dir, store) = open_temp();
        for ts in [10, 20, 30] {
            store.append(&entry(ts, 50)).unwrap();
        }

        let writer = store.writer();
        assert_eq!(writer.delete_before(20).unwrap(), 1);
        drop(writer);
        assert_eq!(store.query().unwrap().len(), 2);

        let writer = store.writer();
        assert_eq!(writer.clear().unwrap(), 2);
        writer.vacuum().unwrap();
        drop(writer);
        assert!(store.query().unwrap().is_empty());
    }

    #[test]
    fn test_reader_sees_writes_while_writer_is_held() {
        let (_dir, store) = open_temp();
        let writer = store.writer();
        writer.append(&entry(1, 1)).unwrap();

        let reader = store.reader().unwrap();
        assert_eq!(reader.count().unwrap(), 1);
        drop(writer);
    }

    #[test]
    fn test_level_only_entry_round_trips() {
        let (_dir, store) = open_temp();
        store.append(&HistoryEntry::level_only(7, 33)).unwrap();

        let stored = store.query().unwrap().remove(0);
        assert_eq!(stored.voltage, UNAVAILABLE);
        assert_eq!(stored.status, BatteryStatus::Unknown);
    }

    #[test]
    fn test_days_before() {
        assert_eq!(days_before(MILLIS_PER_DAY * 31, 30), MILLIS_PER_DAY);
    }
}
