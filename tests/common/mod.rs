//! Shared helpers for CLI integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, ExitStatus};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Transcript of the invocation, kept for failure messages.
    pub log_path: PathBuf,
}

/// Run the built `fedorable` binary with `args`, recording a transcript named `case`.
pub fn run_cli_case(case: &str, args: &[&str]) -> CmdResult {
    let output = Command::new(env!("CARGO_BIN_EXE_fedorable"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("spawn fedorable binary");

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    let dir = std::env::temp_dir().join("fedorable-cli-tests");
    std::fs::create_dir_all(&dir).expect("create transcript dir");
    let log_path = dir.join(format!("{case}.log"));
    let transcript = format!(
        "args: {args:?}\nstatus: {:?}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n",
        output.status.code()
    );
    std::fs::write(&log_path, transcript).expect("write transcript");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
