//! Interrupt cleanup: a watcher thread that records the interruption, releases
//! the lock and exits with `128 + signo`.

use std::path::PathBuf;
use std::thread::JoinHandle;

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};

use crate::core::errors::{FedorableError, Result};
use crate::logger::{Level, append_line};
use crate::runner::lock::release_lock_file;

const WATCHED: [i32; 3] = [SIGINT, SIGTERM, SIGHUP];

/// Paths the handler needs once the main thread is no longer reachable.
#[derive(Debug, Clone)]
pub struct CleanupTarget {
    pub lock_path: PathBuf,
    pub pid: u32,
    pub log_path: PathBuf,
}

/// Running signal watcher. Dropping it leaves the thread running; call
/// [`SignalWatcher::stop`] to detach the handlers.
pub struct SignalWatcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    pub fn stop(mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Start watching SIGINT, SIGTERM and SIGHUP.
pub fn install_cleanup_handler(target: CleanupTarget) -> Result<SignalWatcher> {
    let mut signals = Signals::new(WATCHED).map_err(|e| FedorableError::Runtime {
        details: format!("cannot register signal handlers: {e}"),
    })?;
    let handle = signals.handle();
    let thread = std::thread::Builder::new()
        .name("fedorable-signals".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                let code = handle_signal(sig, &target);
                std::process::exit(code);
            }
        })
        .map_err(|e| FedorableError::Runtime {
            details: format!("cannot start signal watcher: {e}"),
        })?;
    Ok(SignalWatcher {
        handle,
        thread: Some(thread),
    })
}

/// Log and release for `sig`; returns the exit code to terminate with.
pub fn handle_signal(sig: i32, target: &CleanupTarget) -> i32 {
    let message = format!("Interrupted by {}; releasing lock and exiting", signal_name(sig));
    if let Err(e) = append_line(&target.log_path, Level::Error, &message) {
        eprintln!("[ERROR] {message} (log unavailable: {e})");
    } else {
        eprintln!("[ERROR] {message}");
    }
    if let Err(e) = release_lock_file(&target.lock_path, target.pid) {
        eprintln!("[ERROR] {e}");
    }
    128 + sig
}

fn signal_name(sig: i32) -> &'static str {
    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "signal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn handler_logs_releases_and_picks_exit_code() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("fedorable.lock");
        let log_path = tmp.path().join("run.log");
        std::fs::write(&lock_path, "777\n").unwrap();
        std::fs::write(&log_path, "").unwrap();

        let target = CleanupTarget {
            lock_path: lock_path.clone(),
            pid: 777,
            log_path: log_path.clone(),
        };
        assert_eq!(handle_signal(SIGTERM, &target), 143);
        assert!(!lock_path.exists());
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("[ERROR] Interrupted by SIGTERM"));
    }

    #[test]
    fn handler_keeps_someone_elses_lock() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("fedorable.lock");
        std::fs::write(&lock_path, "778\n").unwrap();
        let target = CleanupTarget {
            lock_path: lock_path.clone(),
            pid: 777,
            log_path: tmp.path().join("missing.log"),
        };
        assert_eq!(handle_signal(SIGINT, &target), 130);
        assert!(lock_path.exists());
    }

    #[test]
    fn watcher_can_be_stopped() {
        let tmp = TempDir::new().unwrap();
        let watcher = install_cleanup_handler(CleanupTarget {
            lock_path: tmp.path().join("l"),
            pid: std::process::id(),
            log_path: tmp.path().join("log"),
        })
        .unwrap();
        watcher.stop();
    }
}
