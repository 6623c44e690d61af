//! PID-file daemon handle
//!
//! At most one daemon runs per state directory. The daemon holds an exclusive
//! advisory lock on its PID file for its whole lifetime and records its process
//! id in it. The lock is what counts: a file nobody holds is stale whatever pid
//! it names, since pids get reused after a crash. Readers remove stale or
//! corrupt files on sight.

use fs2::FileExt;
use nix::errno::Errno;
use nix::sys::signal;
use nix::unistd::Pid;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::HandleError;

/// Exclusive ownership of the daemon PID file
///
/// Dropping the handle releases the lock but leaves the file behind; call
/// [`DaemonHandle::release`] on clean shutdown.
#[derive(Debug)]
pub struct DaemonHandle {
    path: PathBuf,
    file: File,
    pid: u32,
}

impl DaemonHandle {
    /// Claim the PID file for the current process
    ///
    /// Fails with [`HandleError::AlreadyRunning`] when another process holds
    /// the lock; in that case the file is left untouched. An unlocked file is
    /// taken over.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, HandleError> {
        Self::acquire_as(path, std::process::id())
    }

    fn acquire_as(path: impl Into<PathBuf>, pid: u32) -> Result<Self, HandleError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Open without truncating: the current contents belong to whoever
        // holds the lock until we hold it ourselves.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(HandleError::AlreadyRunning {
                pid: read_pid(&path),
            });
        }

        if let Some(previous) = read_pid(&path).filter(|&previous| previous != pid) {
            debug!(path = %path.display(), previous, "taking over unlocked PID file");
        }
        write_pid(&mut file, pid)?;
        debug!(path = %path.display(), pid, "daemon handle acquired");
        Ok(Self { path, file, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Re-record our pid if the file went missing or was overwritten
    ///
    /// Returns `true` when the file had to be restored.
    pub fn ensure_recorded(&mut self) -> Result<bool, HandleError> {
        if read_pid(&self.path) == Some(self.pid) {
            return Ok(false);
        }

        if self.is_same_file()? {
            write_pid(&mut self.file, self.pid)?;
        } else {
            // The file was removed or replaced; claim the new one.
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&self.path)?;
            if file.try_lock_exclusive().is_err() {
                return Err(HandleError::AlreadyRunning {
                    pid: read_pid(&self.path),
                });
            }
            self.file = file;
            write_pid(&mut self.file, self.pid)?;
        }

        warn!(path = %self.path.display(), pid = self.pid, "restored daemon PID file");
        Ok(true)
    }

    /// Remove the PID file and drop the lock
    pub fn release(self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "daemon handle released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove PID file"),
        }
    }

    /// Pid of the live daemon recorded at `path`, if any
    ///
    /// A file nobody holds locked, or one holding garbage, is deleted.
    pub fn running_pid(path: &Path) -> Option<u32> {
        let mut file = File::open(path).ok()?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).ok()?;

        match contents.trim().parse::<u32>() {
            Ok(pid) if is_locked(&file) => is_alive(pid).then_some(pid),
            Ok(pid) => {
                debug!(path = %path.display(), pid, "removing stale PID file");
                drop(file);
                remove_quietly(path);
                None
            }
            Err(_) => {
                // An empty file may be a daemon between open and write.
                if !contents.trim().is_empty() {
                    debug!(path = %path.display(), "removing corrupt PID file");
                    remove_quietly(path);
                }
                None
            }
        }
    }

    fn is_same_file(&self) -> Result<bool, HandleError> {
        let on_disk = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let held = self.file.metadata()?;
        Ok(on_disk.dev() == held.dev() && on_disk.ino() == held.ino())
    }
}

/// Whether a process with this pid exists
///
/// `EPERM` means it exists but belongs to someone else.
fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Whether another open file description holds a lock on `file`
fn is_locked(file: &File) -> bool {
    if FileExt::try_lock_shared(file).is_err() {
        return true;
    }
    if let Err(e) = FileExt::unlock(file) {
        warn!(error = %e, "failed to release PID file probe lock");
    }
    false
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn write_pid(file: &mut File, pid: u32) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", pid)?;
    file.sync_all()
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove PID file");
        }
    }
}
