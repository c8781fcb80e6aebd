//! Single-slot "last known" snapshot.
//!
//! Reads are served from memory. Writes replace the slot immediately and
//! are queued to a background thread that persists them in submission
//! order, so callers never wait on disk. Only level, status and plugged
//! are persisted; the extended fields come back as sentinels after a
//! restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{PoisonError, RwLock};
use std::thread::JoinHandle;

use gauge_protocol::{BatterySnapshot, BatteryStatus, PluggedSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::data_dir;

const CACHE_FILE_NAME: &str = "snapshot.json";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cache writer has stopped")]
    WriterGone,
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// On-disk form of the cached snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFields {
    pub battery_level: i32,
    pub battery_status: i32,
    pub battery_plugged: i32,
}

impl CachedFields {
    fn from_snapshot(snapshot: &BatterySnapshot) -> Self {
        Self {
            battery_level: snapshot.level,
            battery_status: snapshot.status.code(),
            battery_plugged: snapshot.plugged.code(),
        }
    }

    fn into_snapshot(self) -> BatterySnapshot {
        BatterySnapshot {
            level: self.battery_level.clamp(0, 100),
            status: BatteryStatus::from_code(self.battery_status),
            plugged: PluggedSource::from_code(self.battery_plugged),
            ..BatterySnapshot::default()
        }
    }
}

enum WriterCommand {
    Persist(CachedFields),
    Flush(mpsc::Sender<()>),
}

pub struct SnapshotCache {
    current: RwLock<BatterySnapshot>,
    tx: Option<mpsc::Sender<WriterCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl SnapshotCache {
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir().join(CACHE_FILE_NAME))
    }

    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let initial = load(&path);

        let (tx, rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("snapshot-cache".to_string())
            .spawn(move || run_writer(path, rx))?;

        Ok(Self {
            current: RwLock::new(initial),
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Last written snapshot, or the default snapshot if none was ever written.
    pub fn read(&self) -> BatterySnapshot {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the slot and queue the write.
    pub fn write(&self, snapshot: BatterySnapshot) {
        let fields = CachedFields::from_snapshot(&snapshot);

        // Enqueue under the lock so queue order matches slot order.
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = snapshot;

        match &self.tx {
            Some(tx) if tx.send(WriterCommand::Persist(fields)).is_ok() => {
                trace!(level = fields.battery_level, "Queued snapshot write");
            }
            _ => warn!("Snapshot cache writer is gone, write kept in memory only"),
        }
    }

    /// Block until every write queued so far is on disk.
    pub fn flush(&self) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(CacheError::WriterGone)?;
        let (ack_tx, ack_rx) = mpsc::channel();
        tx.send(WriterCommand::Flush(ack_tx))
            .map_err(|_| CacheError::WriterGone)?;
        ack_rx.recv().map_err(|_| CacheError::WriterGone)
    }
}

impl Drop for SnapshotCache {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Snapshot cache writer panicked");
            }
        }
    }
}

fn run_writer(path: PathBuf, rx: mpsc::Receiver<WriterCommand>) {
    debug!(path = %path.display(), "Snapshot cache writer started");

    while let Ok(command) = rx.recv() {
        match command {
            WriterCommand::Persist(fields) => {
                if let Err(e) = persist(&path, &fields) {
                    warn!(error = %e, "Failed to persist snapshot");
                }
            }
            WriterCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    debug!("Snapshot cache writer stopped");
}

fn load(path: &Path) -> BatterySnapshot {
    if !path.exists() {
        return BatterySnapshot::default();
    }

    let fields = fs::read_to_string(path)
        .map_err(CacheError::from)
        .and_then(|content| Ok(serde_json::from_str::<CachedFields>(&content)?));

    match fields {
        Ok(fields) => fields.into_snapshot(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable snapshot cache, using defaults");
            BatterySnapshot::default()
        }
    }
}

/// Write to a sibling temp file and rename over the cache.
fn persist(path: &Path, fields: &CachedFields) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec(fields)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
