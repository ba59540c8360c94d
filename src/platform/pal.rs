//! Platform abstraction layer: external command execution, program lookup, and
//! filesystem statistics.
//!
//! Tasks never touch `std::process` directly; they go through [`Platform`] so tests
//! can substitute a [`ScriptedPlatform`](super::scripted::ScriptedPlatform).

use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::core::errors::{FedorableError, Result};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A fully described external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Text piped to the child's stdin.
    pub stdin: Option<String>,
    /// Set for queries that cannot change system state.
    pub read_only: bool,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            read_only: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Shell-like rendering for logs (`journalctl --vacuum-time=2weeks`).
    #[must_use]
    pub fn display(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('\'') {
                out.push('\'');
                out.push_str(&arg.replace('\'', r"'\''"));
                out.push('\'');
            } else {
                out.push_str(arg);
            }
        }
        out
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `128 + signo` when the child was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn status(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Non-empty stdout lines, trimmed.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Filesystem stats
// ---------------------------------------------------------------------------

/// Capacity snapshot of one mounted filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FsStats {
    pub total_bytes: u64,
    /// Bytes available to unprivileged writers.
    pub available_bytes: u64,
}

impl FsStats {
    #[must_use]
    pub const fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn free_pct(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.available_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Platform trait
// ---------------------------------------------------------------------------

/// Everything tasks need from the host.
pub trait Platform {
    /// Run a command to completion and capture its output.
    ///
    /// A non-zero exit status is not an error here; only a failure to launch is.
    fn run(&mut self, command: &CommandSpec) -> Result<CommandOutput>;

    /// Whether `program` resolves to an executable.
    fn has_program(&self, program: &str) -> bool;

    fn path_exists(&self, path: &Path) -> bool;

    fn fs_stats(&self, path: &Path) -> Result<FsStats>;
}

/// The real host.
#[derive(Debug, Clone)]
pub struct LinuxPlatform {
    search_path: Vec<PathBuf>,
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxPlatform {
    /// Capture `$PATH` once, with the sbin directories root tools live in appended.
    #[must_use]
    pub fn new() -> Self {
        let mut search_path: Vec<PathBuf> = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        for extra in ["/usr/local/sbin", "/usr/local/bin", "/usr/sbin", "/usr/bin", "/sbin", "/bin"] {
            let extra = PathBuf::from(extra);
            if !search_path.contains(&extra) {
                search_path.push(extra);
            }
        }
        Self { search_path }
    }
}

impl Platform for LinuxPlatform {
    fn run(&mut self, command: &CommandSpec) -> Result<CommandOutput> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let spawn_err = |e: std::io::Error| FedorableError::Spawn {
            program: command.program.clone(),
            details: e.to_string(),
        };

        let mut child = cmd.spawn().map_err(spawn_err)?;
        if let Some(input) = &command.stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).map_err(spawn_err)?;
            }
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        Ok(CommandOutput {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn has_program(&self, program: &str) -> bool {
        if program.contains('/') {
            return is_executable(Path::new(program));
        }
        self.search_path
            .iter()
            .any(|dir| is_executable(&dir.join(program)))
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn fs_stats(&self, path: &Path) -> Result<FsStats> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(|e| FedorableError::FsStats {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        let fragment = u64::from(stat.fragment_size());
        Ok(FsStats {
            total_bytes: u64::from(stat.blocks()).saturating_mul(fragment),
            available_bytes: u64::from(stat.blocks_available()).saturating_mul(fragment),
        })
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let cmd = CommandSpec::new("timeshift")
            .args(["--create", "--comments"])
            .arg("fedorable pre-maintenance");
        assert_eq!(
            cmd.display(),
            "timeshift --create --comments 'fedorable pre-maintenance'"
        );
    }

    #[test]
    fn output_lines_skip_blanks() {
        let out = CommandOutput::ok("a\n\n  b  \n");
        assert_eq!(out.lines().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn free_pct_handles_zero_total() {
        let stats = FsStats {
            total_bytes: 0,
            available_bytes: 0,
        };
        assert!(stats.free_pct().abs() < f64::EPSILON);
        let stats = FsStats {
            total_bytes: 200,
            available_bytes: 50,
        };
        assert_eq!(stats.used_bytes(), 150);
        assert!((stats.free_pct() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn linux_platform_runs_commands_and_captures_exit_codes() {
        let mut platform = LinuxPlatform::new();
        let ok = platform
            .run(&CommandSpec::new("sh").args(["-c", "echo hi"]))
            .unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "hi");

        let failed = platform
            .run(&CommandSpec::new("sh").args(["-c", "exit 3"]))
            .unwrap();
        assert_eq!(failed.exit_code, 3);
    }

    #[test]
    fn linux_platform_pipes_stdin() {
        let mut platform = LinuxPlatform::new();
        let out = platform
            .run(&CommandSpec::new("cat").stdin("piped body"))
            .unwrap();
        assert_eq!(out.stdout, "piped body");
    }

    #[test]
    fn launch_failure_is_a_spawn_error() {
        let mut platform = LinuxPlatform::new();
        let err = platform
            .run(&CommandSpec::new("/nonexistent/fedorable-missing-tool"))
            .unwrap_err();
        assert_eq!(err.code(), "FDR-3003");
    }

    #[test]
    fn program_lookup() {
        let platform = LinuxPlatform::new();
        assert!(platform.has_program("sh"));
        assert!(!platform.has_program("fedorable-definitely-not-installed"));
    }

    #[test]
    fn fs_stats_for_root() {
        let stats = LinuxPlatform::new().fs_stats(Path::new("/")).unwrap();
        assert!(stats.total_bytes > 0);
        assert!(stats.available_bytes <= stats.total_bytes);
    }
}
