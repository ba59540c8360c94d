//! Task model and the per-task execution context.
//!
//! A task is data (`Task { id, precondition, run }`); all of its side effects go
//! through [`TaskContext`], which applies dry-run uniformly: mutating commands and
//! filesystem writes are logged instead of performed, while read-only queries
//! still run so previews stay accurate.

use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use nix::fcntl::OFlag;
use serde::Serialize;
use thiserror::Error;

use crate::core::config::Settings;
use crate::core::errors::FedorableError;
use crate::core::task_id::TaskId;
use crate::logger::RunLogger;
use crate::platform::pal::{CommandOutput, CommandSpec, Platform};
use crate::runner::confirm::ConfirmationGate;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How a task that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// Nothing done; the reason is logged by the task itself.
    Skipped(String),
}

/// A task failure. Each one becomes exactly one ERROR line.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("command `{command}` exited with status {exit_code}")]
    Command { command: String, exit_code: i32 },

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    System(#[from] FedorableError),
}

impl TaskError {
    /// Exit status recorded in the task result.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Command { exit_code, .. } => Some(*exit_code),
            Self::Precondition(_) | Self::System(_) => None,
        }
    }
}

pub type TaskRun = fn(&mut TaskContext<'_>) -> Result<TaskOutcome, TaskError>;
pub type TaskCheck = fn(&mut TaskContext<'_>) -> Result<(), TaskError>;

/// A catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct Task {
    pub id: TaskId,
    /// Checked before `run`; failure aborts only this task.
    pub precondition: Option<TaskCheck>,
    pub run: TaskRun,
}

/// Recorded result of one enabled task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    pub name: TaskId,
    /// `false` when a precondition stopped the task before it ran.
    pub attempted: bool,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a task may touch.
pub struct TaskContext<'a> {
    pub settings: &'a Settings,
    pub dry_run: bool,
    pub log: &'a mut RunLogger,
    pub platform: &'a mut dyn Platform,
    pub gate: &'a mut ConfirmationGate,
}

impl TaskContext<'_> {
    pub fn info(&mut self, message: impl AsRef<str>) {
        self.log.info(message);
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.log.warn(message);
    }

    pub fn success(&mut self, message: impl AsRef<str>) {
        self.log.success(message);
    }

    pub fn confirm(&mut self, prompt: &str) -> bool {
        self.gate.confirm(prompt, self.log)
    }

    #[must_use]
    pub fn has_program(&self, program: &str) -> bool {
        self.platform.has_program(program)
    }

    #[must_use]
    pub fn path_exists(&self, path: &Path) -> bool {
        self.platform.path_exists(path)
    }

    /// Run a mutating command; non-zero exit is a task failure.
    pub fn run(&mut self, command: &CommandSpec) -> Result<CommandOutput, TaskError> {
        self.run_allowing(command, &[0])
    }

    /// Run a mutating command, accepting any exit status in `ok_codes`.
    pub fn run_allowing(
        &mut self,
        command: &CommandSpec,
        ok_codes: &[i32],
    ) -> Result<CommandOutput, TaskError> {
        let out = self.execute(command)?;
        if ok_codes.contains(&out.exit_code) {
            Ok(out)
        } else {
            Err(TaskError::Command {
                command: command.display(),
                exit_code: out.exit_code,
            })
        }
    }

    /// Run a command and hand back its status without judging it.
    ///
    /// Mutating commands are still suppressed under dry-run (reported as success).
    pub fn execute(&mut self, command: &CommandSpec) -> Result<CommandOutput, TaskError> {
        if self.dry_run && !command.read_only {
            self.log.info(format!("[DRY RUN] would run: {command}"));
            return Ok(CommandOutput::default());
        }
        self.log.info(format!("Running: {command}"));
        let out = self.platform.run(command)?;
        self.log.detail(&out.stdout);
        self.log.detail(&out.stderr);
        Ok(out)
    }

    /// Run a read-only query. Always executes, even under dry-run.
    pub fn query(&mut self, command: &CommandSpec) -> Result<CommandOutput, TaskError> {
        let command = command.clone().read_only();
        let out = self.platform.run(&command)?;
        self.log.detail(&out.stdout);
        Ok(out)
    }

    // -- filesystem -----------------------------------------------------------

    /// Delete everything inside `dir`, keeping `dir` itself. Returns entries removed
    /// (or that would be removed under dry-run). A missing directory removes nothing.
    ///
    /// `dir` must be a real directory; a symlink or any other type is refused
    /// with a WARN.
    pub fn remove_dir_contents(&mut self, dir: &Path) -> Result<usize, TaskError> {
        match std::fs::symlink_metadata(dir) {
            Ok(meta) if meta.file_type().is_dir() => {}
            Ok(_) => {
                self.log.warn(format!("Skipping {}: not a real directory", dir.display()));
                return Ok(0);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(FedorableError::io(dir, e).into()),
        }
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(FedorableError::io(dir, e).into()),
        };
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            paths.push(entry.map_err(|e| FedorableError::io(dir, e))?.path());
        }
        paths.sort();

        if self.dry_run {
            if !paths.is_empty() {
                self.log.info(format!(
                    "[DRY RUN] would remove {} entr{} under {}",
                    paths.len(),
                    if paths.len() == 1 { "y" } else { "ies" },
                    dir.display()
                ));
            }
            return Ok(paths.len());
        }

        for path in &paths {
            let result = match std::fs::symlink_metadata(path) {
                Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
                Ok(_) => std::fs::remove_file(path),
                Err(e) => Err(e),
            };
            result.map_err(|e| FedorableError::io(path, e))?;
        }
        Ok(paths.len())
    }

    /// Truncate an existing regular file to zero length. Returns whether it was
    /// truncated. Symlinks and hard-linked files are left alone with a WARN.
    pub fn truncate_file(&mut self, path: &Path) -> Result<bool, TaskError> {
        let meta = match std::fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(FedorableError::io(path, e).into()),
        };
        if meta.file_type().is_symlink() || (meta.is_file() && meta.nlink() > 1) {
            self.log.warn(format!("Skipping {}: linked elsewhere", path.display()));
            return Ok(false);
        }
        if !meta.is_file() {
            return Ok(false);
        }
        if self.dry_run {
            self.log.info(format!("[DRY RUN] would truncate {}", path.display()));
            return Ok(true);
        }
        // A symlink swapped in after the check fails the open.
        std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .custom_flags(OFlag::O_NOFOLLOW.bits())
            .open(path)
            .map_err(|e| FedorableError::io(path, e))?;
        Ok(true)
    }

    pub fn create_dir(&mut self, path: &Path) -> Result<(), TaskError> {
        if self.dry_run {
            self.log.info(format!("[DRY RUN] would create {}", path.display()));
            return Ok(());
        }
        std::fs::create_dir_all(path).map_err(|e| FedorableError::io(path, e))?;
        Ok(())
    }

    pub fn write_file(&mut self, path: &Path, contents: &str) -> Result<(), TaskError> {
        if self.dry_run {
            self.log.info(format!("[DRY RUN] would write {}", path.display()));
            return Ok(());
        }
        std::fs::write(path, contents).map_err(|e| FedorableError::io(path, e))?;
        Ok(())
    }
}
