//! Per-invocation run state: the log, the held lock, and the interrupt watcher.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::core::config::Settings;
use crate::core::errors::Result;
use crate::logger::RunLogger;
use crate::runner::lock::{LockGuard, LockManager};
use crate::runner::signals::{CleanupTarget, SignalWatcher, install_cleanup_handler};

/// Lives from lock acquisition to process exit. At most one per host.
pub struct RunContext {
    pub log: RunLogger,
    lock: LockGuard,
    signals: Option<SignalWatcher>,
    started_at: DateTime<Local>,
    started: Instant,
}

impl RunContext {
    /// Take the lock, open the run log, and arm interrupt cleanup.
    ///
    /// The lock comes first so a refused second instance leaves no log file behind.
    pub fn establish(settings: &Settings, program: &str, quiet: bool) -> Result<Self> {
        let mut ctx = Self::without_signals(settings, program, quiet)?;
        let watcher = install_cleanup_handler(CleanupTarget {
            lock_path: ctx.lock.path().to_path_buf(),
            pid: ctx.lock.pid(),
            log_path: ctx.log.path().to_path_buf(),
        })?;
        ctx.signals = Some(watcher);
        Ok(ctx)
    }

    /// Same as [`RunContext::establish`] minus signal handlers (tests, embedding).
    pub fn without_signals(settings: &Settings, program: &str, quiet: bool) -> Result<Self> {
        let lock = LockManager::new(&settings.lock_file, program).acquire()?;
        let started_at = Local::now();
        let log = RunLogger::create(&settings.log_dir, program, started_at, quiet)?;
        Ok(Self {
            log,
            lock,
            signals: None,
            started_at,
            started: Instant::now(),
        })
    }

    #[must_use]
    pub fn log_file_path(&self) -> &Path {
        self.log.path()
    }

    #[must_use]
    pub fn lock_file_path(&self) -> &Path {
        self.lock.path()
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Disarm the watcher and release the lock.
    pub fn finish(mut self) -> Result<()> {
        if let Some(watcher) = self.signals.take() {
            watcher.stop();
        }
        self.lock.release()
    }
}
