//! Run log: one timestamped, append-only file per run plus level-tagged console
//! output.
//!
//! The file always receives every line. The console honors quiet mode except for
//! errors, which always reach stderr. Every ERROR line counts toward the run's
//! error total, which decides the exit code.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;

use crate::core::errors::{FedorableError, Result};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Error,
    Success,
}

impl Level {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Success => "SUCCESS",
        }
    }

    fn colored_tag(self) -> colored::ColoredString {
        let tag = format!("[{}]", self.tag());
        match self {
            Self::Info => tag.blue(),
            Self::Warn => tag.yellow(),
            Self::Error => tag.red().bold(),
            Self::Success => tag.green(),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Log file name for a run started at `started`: `<program>_<YYYYmmdd_HHMMSS>.log`.
#[must_use]
pub fn log_file_name(program: &str, started: DateTime<Local>) -> String {
    format!("{program}_{}.log", started.format("%Y%m%d_%H%M%S"))
}

fn format_line(level: Level, message: &str) -> String {
    format!(
        "[{}] [{}] {message}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level.tag()
    )
}

/// Append one formatted line to an existing log file.
///
/// Used from the signal handler, which has no access to the run's [`RunLogger`].
pub fn append_line(path: &Path, level: Level, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    writeln!(file, "{}", format_line(level, message))
}

/// Process-wide run logger. Owned by the run context; single writer.
#[derive(Debug)]
pub struct RunLogger {
    path: PathBuf,
    file: File,
    quiet: bool,
    errors: usize,
    warnings: usize,
    write_failed: bool,
}

impl RunLogger {
    /// Create `<log_dir>/<program>_<timestamp>.log` with owner-only permissions.
    pub fn create(log_dir: &Path, program: &str, started: DateTime<Local>, quiet: bool) -> Result<Self> {
        std::fs::create_dir_all(log_dir).map_err(|e| FedorableError::LogSetup {
            path: log_dir.to_path_buf(),
            details: e.to_string(),
        })?;
        Self::open(&log_dir.join(log_file_name(program, started)), quiet)
    }

    /// Open (or create) a specific log file for appending.
    pub fn open(path: &Path, quiet: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| FedorableError::LogSetup {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            quiet,
            errors: 0,
            warnings: 0,
            write_failed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors
    }

    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings
    }

    #[must_use]
    pub const fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn log(&mut self, level: Level, message: impl AsRef<str>) {
        let message = message.as_ref();
        match level {
            Level::Error => self.errors += 1,
            Level::Warn => self.warnings += 1,
            Level::Info | Level::Success => {}
        }

        self.write_file(&format_line(level, message));

        match level {
            Level::Error => eprintln!("{} {message}", level.colored_tag()),
            Level::Warn if !self.quiet => eprintln!("{} {message}", level.colored_tag()),
            Level::Info | Level::Success if !self.quiet => {
                println!("{} {message}", level.colored_tag());
            }
            _ => {}
        }
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.log(Level::Info, message);
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.log(Level::Warn, message);
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.log(Level::Error, message);
    }

    pub fn success(&mut self, message: impl AsRef<str>) {
        self.log(Level::Success, message);
    }

    /// Raw text (captured command output) for the file only, indented.
    pub fn detail(&mut self, text: &str) {
        let body: String = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| format!("    | {l}\n"))
            .collect();
        if !body.is_empty() {
            self.write_raw(&body);
        }
    }

    fn write_file(&mut self, line: &str) {
        self.write_raw(&format!("{line}\n"));
    }

    fn write_raw(&mut self, text: &str) {
        if let Err(e) = self.file.write_all(text.as_bytes()) {
            if !self.write_failed {
                self.write_failed = true;
                eprintln!(
                    "{} cannot write log file {}: {e}",
                    Level::Warn.colored_tag(),
                    self.path.display()
                );
            }
        }
    }
}
