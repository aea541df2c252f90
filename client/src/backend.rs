//! File-backed local storage and cross-process change detection.

use autotest_engine::{error::Result, Error, SessionStore, StorageBackend};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Sidecar file locked for the duration of a read-modify-write.
const LOCK_FILE: &str = ".lock";

/// One file per key under a directory.
///
/// Writes go to a uniquely named temporary file first and are renamed into
/// place, so a reader in another process never sees a half-written value.
/// [`StorageBackend::exclusive`] serializes whole updates across processes
/// through an `fs2` lock on a sidecar file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) the state directory.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::Storage(format!("invalid storage key {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

fn storage_error(e: std::io::Error) -> Error {
    Error::Storage(e.to_string())
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path(key)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir).map_err(storage_error)?;
        temp.write_all(value.as_bytes()).map_err(storage_error)?;
        temp.persist(&path).map_err(|e| storage_error(e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }

    fn exclusive(&self, update: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE))
            .map_err(storage_error)?;
        lock_file.lock_exclusive().map_err(storage_error)?;

        let outcome = update();
        if let Err(e) = FileExt::unlock(&lock_file) {
            tracing::warn!(error = %e, "failed to release local state lock");
        }
        outcome
    }
}

/// Background task that polls the store's backend for writes made by other
/// processes and turns them into change events.
///
/// Stops when dropped.
#[derive(Debug)]
pub struct StorageWatcher {
    handle: JoinHandle<()>,
}

impl StorageWatcher {
    /// Start polling every `interval`. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<SessionStore>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.sync_from_backend();
            }
        });
        tracing::debug!(interval_ms = interval.as_millis() as u64, "storage watcher started");
        Self { handle }
    }

    pub fn stop(self) {}
}

impl Drop for StorageWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
