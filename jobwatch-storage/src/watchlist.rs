//! Watch-list store
//!
//! The watch-list is a small JSON file read on every reconciliation and
//! written once per add/remove. Writes go to a sibling temp file which is then
//! renamed over the original, so a crash mid-write leaves the previous file
//! intact. Read-modify-write cycles hold an in-process mutex and an exclusive
//! advisory lock on a sibling `.lock` file, which serializes the CLI and the
//! daemon.

use fs2::FileExt;
use jobwatch_core::domain::job::JobId;
use jobwatch_core::domain::watchlist::WatchList;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::StoreError;

/// Persistent set of watched jobs
pub trait WatchListStore: Send + Sync {
    /// Reads the watch-list
    ///
    /// A missing or unreadable file yields an empty list; this never fails.
    fn load(&self) -> WatchList;

    /// Atomically replaces the stored list
    fn save(&self, list: &WatchList) -> Result<(), StoreError>;

    /// Read-modify-write under the store's lock
    ///
    /// `apply` returns whether it changed the list; the file is only written
    /// when it did. Returns that same flag.
    fn update(&self, apply: &mut dyn FnMut(&mut WatchList) -> bool) -> Result<bool, StoreError>;

    /// Adds a job; `false` means it was already present and nothing was written
    fn add(&self, id: &JobId) -> Result<bool, StoreError> {
        self.update(&mut |list| list.insert(id.clone()))
    }

    /// Removes a job; `false` means it was not present
    fn remove(&self, id: &JobId) -> Result<bool, StoreError> {
        self.update(&mut |list| list.remove(id))
    }
}

/// JSON file implementation of [`WatchListStore`]
pub struct FileWatchListStore {
    path: PathBuf,
    lock_path: PathBuf,
    writer: Mutex<()>,
}

impl FileWatchListStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self {
            path,
            lock_path,
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> WatchList {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return WatchList::new(),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read watch-list, treating as empty"
                );
                return WatchList::new();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(list) => list,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "malformed watch-list, treating as empty"
                );
                WatchList::new()
            }
        }
    }

    fn write_atomic(&self, list: &WatchList) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let mut data = serde_json::to_vec_pretty(list)?;
        data.push(b'\n');

        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&data)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Runs `f` while holding the cross-process lock
    fn with_file_lock<T>(
        &self,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        lock_file.lock_exclusive()?;

        let result = f();

        // Closing the file releases the lock as well; unlock explicitly so the
        // error (if any) is not silently lost in a destructor.
        if let Err(e) = FileExt::unlock(&lock_file) {
            warn!(
                path = %self.lock_path.display(),
                error = %e,
                "failed to release watch-list lock"
            );
        }
        result
    }
}

impl WatchListStore for FileWatchListStore {
    fn load(&self) -> WatchList {
        self.read()
    }

    fn save(&self, list: &WatchList) -> Result<(), StoreError> {
        let _guard = self.writer.lock();
        self.with_file_lock(|| self.write_atomic(list))
    }

    fn update(&self, apply: &mut dyn FnMut(&mut WatchList) -> bool) -> Result<bool, StoreError> {
        let _guard = self.writer.lock();
        self.with_file_lock(|| {
            let mut list = self.read();
            let changed = apply(&mut list);
            if changed {
                self.write_atomic(&list)?;
            }
            Ok(changed)
        })
    }
}
