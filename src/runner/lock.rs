//! Host-wide single-instance lock backed by a pid file.
//!
//! A lock is live only while its recorded process exists and is an instance of
//! this program. Anything else (dead pid, recycled pid now owned by another
//! program, unparsable contents) is stale and reclaimed on the next acquire.
//!
//! The holder also keeps an exclusive `flock` on the file for its whole run, so
//! two instances reclaiming the same stale file cannot both win.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write as _};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::core::errors::{FedorableError, Result};

/// `/proc/<pid>/comm` holds at most this many bytes of the executable name.
const COMM_LEN: usize = 15;

/// Retries when the lock file is unlinked between open and flock.
const ACQUIRE_ATTEMPTS: usize = 3;

/// Acquires the lock file at a fixed path on behalf of `program_name`.
#[derive(Debug, Clone)]
pub struct LockManager {
    path: PathBuf,
    program_name: String,
}

impl LockManager {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, program_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            program_name: program_name.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock for the current process.
    pub fn acquire(&self) -> Result<LockGuard> {
        self.acquire_as(std::process::id())
    }

    fn acquire_as(&self, pid: u32) -> Result<LockGuard> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| FedorableError::lock(&self.path, e.to_string()))?;
        }

        for _ in 0..ACQUIRE_ATTEMPTS {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .mode(0o644)
                .open(&self.path)
                .map_err(|e| FedorableError::lock(&self.path, e.to_string()))?;
            let held = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(held) => held,
                Err((_, Errno::EWOULDBLOCK)) => {
                    return Err(FedorableError::AlreadyRunning {
                        pid: read_lock_pid(&self.path)?.unwrap_or(0),
                        path: self.path.clone(),
                    });
                }
                Err((_, errno)) => return Err(FedorableError::lock(&self.path, errno.to_string())),
            };
            // The previous holder unlinked the file between our open and flock.
            if !self.still_linked(&held)? {
                continue;
            }

            if let Some(holder) = read_lock_pid(&self.path)? {
                if u32::try_from(holder).ok() != Some(pid) && self.is_live_holder(holder) {
                    return Err(FedorableError::AlreadyRunning {
                        pid: holder,
                        path: self.path.clone(),
                    });
                }
            }

            let mut file: &File = &held;
            file.set_len(0).map_err(|e| FedorableError::lock(&self.path, e.to_string()))?;
            writeln!(file, "{pid}").map_err(|e| FedorableError::lock(&self.path, e.to_string()))?;

            return Ok(LockGuard {
                path: self.path.clone(),
                pid,
                released: false,
                held: Some(held),
            });
        }
        Err(FedorableError::lock(
            &self.path,
            "lock file was replaced during every acquire attempt".to_string(),
        ))
    }

    /// Whether the locked descriptor is still the file at `self.path`.
    fn still_linked(&self, held: &Flock<File>) -> Result<bool> {
        let ours = held.metadata().map_err(|e| FedorableError::lock(&self.path, e.to_string()))?;
        match std::fs::metadata(&self.path) {
            Ok(on_disk) => Ok(on_disk.dev() == ours.dev() && on_disk.ino() == ours.ino()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FedorableError::lock(&self.path, e.to_string())),
        }
    }

    fn is_live_holder(&self, pid: i32) -> bool {
        if pid <= 0 || !process_exists(pid) {
            return false;
        }
        match std::fs::read_to_string(format!("/proc/{pid}/comm")) {
            Ok(comm) => comm_matches(comm.trim_end(), &self.program_name),
            // Process exists but /proc is unavailable; assume it is ours.
            Err(_) => true,
        }
    }
}

/// Held lock: the pid file plus an exclusive flock on it. Released on drop.
pub struct LockGuard {
    path: PathBuf,
    pid: u32,
    released: bool,
    held: Option<Flock<File>>,
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("path", &self.path)
            .field("pid", &self.pid)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl LockGuard {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Release now. Idempotent.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        // Unlink while still holding the flock, then let it go.
        let removed = release_lock_file(&self.path, self.pid).map(|_| ());
        drop(self.held.take());
        removed
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            eprintln!("[FDR] lock release failed: {e}");
        }
    }
}

/// Remove the lock file at `path` if, and only if, it records `pid`.
///
/// Returns whether a file was removed.
pub fn release_lock_file(path: &Path, pid: u32) -> Result<bool> {
    let Some(holder) = read_lock_pid(path)? else {
        return Ok(false);
    };
    if u32::try_from(holder).ok() != Some(pid) {
        return Ok(false);
    }
    remove_if_present(path)?;
    Ok(true)
}

/// Pid recorded in the lock file; `None` when absent or unparsable.
fn read_lock_pid(path: &Path) -> Result<Option<i32>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(raw.trim().parse::<i32>().ok()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FedorableError::lock(path, e.to_string())),
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FedorableError::lock(path, e.to_string())),
    }
}

fn process_exists(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

fn comm_matches(comm: &str, program: &str) -> bool {
    let truncated: String = program.chars().take(COMM_LEN).collect();
    comm == truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Name of the running test binary, as the kernel reports it.
    fn own_comm() -> String {
        std::fs::read_to_string("/proc/self/comm")
            .unwrap()
            .trim_end()
            .to_string()
    }

    fn manager(tmp: &TempDir) -> LockManager {
        LockManager::new(tmp.path().join("fedorable.lock"), own_comm())
    }

    #[test]
    fn acquire_writes_own_pid() {
        let tmp = TempDir::new().unwrap();
        let lock = manager(&tmp);
        let guard = lock.acquire().unwrap();
        let raw = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(raw.trim(), std::process::id().to_string());
        assert_eq!(guard.pid(), std::process::id());
    }

    #[test]
    fn second_acquire_fails_while_held_then_succeeds_after_release() {
        let tmp = TempDir::new().unwrap();
        let first = manager(&tmp);
        let mut guard = first.acquire().unwrap();

        let err = manager(&tmp).acquire().unwrap_err();
        assert_eq!(err.code(), "FDR-2001");

        guard.release().unwrap();
        assert!(!first.path().exists());
        let _third = manager(&tmp).acquire().unwrap();
    }

    #[test]
    fn drop_releases() {
        let tmp = TempDir::new().unwrap();
        let lock = manager(&tmp);
        drop(lock.acquire().unwrap());
        assert!(!lock.path().exists());
    }

    #[test]
    fn interrupted_holder_releases_through_free_function() {
        let tmp = TempDir::new().unwrap();
        let lock = manager(&tmp);
        let guard = lock.acquire().unwrap();
        assert!(release_lock_file(lock.path(), guard.pid()).unwrap());
        assert!(!lock.path().exists());
        drop(guard);
        let _next = manager(&tmp).acquire().unwrap();
    }

    #[test]
    fn flock_wins_over_a_dead_pid_in_the_file() {
        let tmp = TempDir::new().unwrap();
        let lock = manager(&tmp);
        let _guard = lock.acquire().unwrap();
        // A holder's recorded pid got clobbered; its flock still holds.
        std::fs::write(lock.path(), format!("{}\n", i32::MAX)).unwrap();
        let err = manager(&tmp).acquire().unwrap_err();
        assert_eq!(err.code(), "FDR-2001");
    }

    #[test]
    fn reclaimed_stale_lock_admits_only_one_holder() {
        let tmp = TempDir::new().unwrap();
        let lock = manager(&tmp);
        std::fs::write(lock.path(), format!("{}\n", i32::MAX)).unwrap();
        let first = lock.acquire().unwrap();
        assert!(manager(&tmp).acquire().is_err());
        let raw = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(raw.trim(), first.pid().to_string());
    }

    #[test]
    fn unlinked_lock_file_is_not_reused() {
        let tmp = TempDir::new().unwrap();
        let lock = manager(&tmp);
        std::fs::write(lock.path(), "1\n").unwrap();
        let stale = File::open(lock.path()).unwrap();
        std::fs::remove_file(lock.path()).unwrap();
        std::fs::write(lock.path(), "").unwrap();
        let held = Flock::lock(stale, FlockArg::LockExclusiveNonblock).unwrap();
        assert!(!lock.still_linked(&held).unwrap());
    }

    #[test]
    fn dead_pid_is_stale() {
        let tmp = TempDir::new().unwrap();
        let lock = manager(&tmp);
        std::fs::write(lock.path(), format!("{}\n", i32::MAX)).unwrap();
        let _guard = lock.acquire().unwrap();
    }

    #[test]
    fn garbage_contents_are_stale() {
        let tmp = TempDir::new().unwrap();
        let lock = manager(&tmp);
        std::fs::write(lock.path(), "not a pid").unwrap();
        let _guard = lock.acquire().unwrap();
    }

    #[test]
    fn live_pid_of_another_program_is_stale() {
        let tmp = TempDir::new().unwrap();
        let lock = LockManager::new(tmp.path().join("fedorable.lock"), "fedorable-other");
        std::fs::write(lock.path(), format!("{}\n", std::process::id())).unwrap();
        let guard = lock.acquire().unwrap();
        assert_eq!(guard.pid(), std::process::id());
    }

    #[test]
    fn release_leaves_a_foreign_lock_alone() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fedorable.lock");
        std::fs::write(&path, "4242\n").unwrap();
        assert!(!release_lock_file(&path, std::process::id()).unwrap());
        assert!(path.exists());
        assert!(!release_lock_file(&tmp.path().join("absent.lock"), 1).unwrap());
    }

    #[test]
    fn comm_comparison_truncates_long_names() {
        assert!(comm_matches("fedorable", "fedorable"));
        assert!(comm_matches("a-very-long-pro", "a-very-long-program-name"));
        assert!(!comm_matches("bash", "fedorable"));
    }
}
