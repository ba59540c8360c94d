//! Top-level CLI definition and dispatch.

use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use colored::{Colorize, control};
use thiserror::Error;

use fedorable::core::errors::FedorableError;
use fedorable::core::options::{CliOverrides, Toggle, load_and_resolve};
use fedorable::core::task_id::TaskId;
use fedorable::platform::pal::LinuxPlatform;
use fedorable::report::write_json_line;
use fedorable::runner::confirm::{ConfirmationGate, StdinPrompter};
use fedorable::runner::context::RunContext;
use fedorable::runner::run_maintenance;

/// Name used for the log file prefix and the lock liveness check.
const PROGRAM: &str = "fedorable";

/// Fedora maintenance runner: updates, cleanup and housekeeping in one pass.
///
/// Per-task switches: `--no-<task>` skips a default task, `--perform-<task>` enables
/// an optional one. Both forms exist for every task; they apply left to right
/// together with `--all` and `--none`.
#[derive(Debug, Parser)]
#[command(
    name = "fedorable",
    author,
    version,
    about = "Fedora maintenance runner",
    args_override_self = true
)]
pub struct Cli {
    /// Answer yes to every confirmation prompt.
    #[arg(short = 'y', long = "yes")]
    yes: bool,
    /// Log what would run without changing anything.
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Errors only on the console (the log file still gets everything).
    #[arg(short, long)]
    quiet: bool,
    /// Only check for available updates, then exit.
    #[arg(long)]
    check_only: bool,
    /// Mail the run log when finished.
    #[arg(long)]
    email_report: bool,
    /// Recipient for --email-report.
    #[arg(long, value_name = "ADDR")]
    email_recipient: Option<String>,
    /// Subject for --email-report.
    #[arg(long, value_name = "TEXT")]
    email_subject: Option<String>,
    /// Config file (default /etc/fedorable.conf).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Print the run summary as one JSON line.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Enable every default task.
    #[arg(long)]
    all: bool,
    /// Disable every default task.
    #[arg(long)]
    none: bool,
}

/// Failures that end the process before or after the run proper.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Startup(#[from] FedorableError),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Startup(_) | Self::Io(_) => 1,
        }
    }
}

fn perform_id(id: TaskId) -> String {
    format!("perform-{}", id.flag_name())
}

fn skip_id(id: TaskId) -> String {
    format!("no-{}", id.flag_name())
}

/// The derived command plus one `--perform-*` / `--no-*` pair per task.
///
/// Help lists `--no-*` for default tasks and `--perform-*` for optional ones.
pub fn command() -> clap::Command {
    let mut cmd = Cli::command();
    for id in TaskId::ALL {
        cmd = cmd
            .arg(
                Arg::new(perform_id(id))
                    .long(perform_id(id))
                    .action(ArgAction::SetTrue)
                    .help(format!("Run: {}", id.description()))
                    .hide(id.is_standard())
                    .help_heading("Tasks"),
            )
            .arg(
                Arg::new(skip_id(id))
                    .long(skip_id(id))
                    .action(ArgAction::SetTrue)
                    .help(format!("Skip: {}", id.description()))
                    .hide(!id.is_standard())
                    .help_heading("Tasks"),
            );
    }
    cmd
}

fn given(matches: &ArgMatches, id: &str) -> Option<usize> {
    if matches.value_source(id) == Some(ValueSource::CommandLine) && matches.get_flag(id) {
        matches.index_of(id)
    } else {
        None
    }
}

/// Task toggles in the order they appeared on the command line.
fn ordered_toggles(matches: &ArgMatches) -> Vec<Toggle> {
    let mut seen: Vec<(usize, Toggle)> = Vec::new();
    if let Some(i) = given(matches, "all") {
        seen.push((i, Toggle::All));
    }
    if let Some(i) = given(matches, "none") {
        seen.push((i, Toggle::None));
    }
    for id in TaskId::ALL {
        if let Some(i) = given(matches, &perform_id(id)) {
            seen.push((i, Toggle::Enable(id)));
        }
        if let Some(i) = given(matches, &skip_id(id)) {
            seen.push((i, Toggle::Disable(id)));
        }
    }
    seen.sort_by_key(|(i, _)| *i);
    seen.into_iter().map(|(_, t)| t).collect()
}

/// Parse argv into command-line overrides.
pub fn parse_overrides<I, T>(args: I) -> Result<CliOverrides, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    let cli = Cli::from_arg_matches(&matches)?;
    Ok(CliOverrides {
        toggles: ordered_toggles(&matches),
        force_yes: cli.yes,
        dry_run: cli.dry_run,
        quiet: cli.quiet,
        check_only: cli.check_only,
        email_report: cli.email_report,
        email_recipient: cli.email_recipient,
        email_subject: cli.email_subject,
        config_path: cli.config,
        json: cli.json,
        no_color: cli.no_color,
    })
}

/// Binary entry point; returns the process exit code.
pub fn main_exit_code() -> i32 {
    let overrides = match parse_overrides(std::env::args_os()) {
        Ok(overrides) => overrides,
        Err(e) => {
            // Help and version go to stdout and succeed; real parse errors do not.
            let code = i32::from(e.use_stderr());
            let _ = e.print();
            return code;
        }
    };
    match run(&overrides) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "[ERROR]".red().bold());
            e.exit_code()
        }
    }
}

fn require_root() -> Result<(), FedorableError> {
    let euid = nix::unistd::geteuid();
    if euid.is_root() {
        Ok(())
    } else {
        Err(FedorableError::NotRoot { euid: euid.as_raw() })
    }
}

/// Resolve configuration, pass the startup checks, and run.
pub fn run(cli: &CliOverrides) -> Result<i32, CliError> {
    if cli.no_color {
        control::set_override(false);
    }
    let config = load_and_resolve(cli)?;
    require_root()?;
    if config.needs_interaction() && !io::stdin().is_terminal() {
        return Err(FedorableError::NonInteractive.into());
    }

    let mut ctx = RunContext::establish(&config.settings, PROGRAM, config.quiet)?;
    let mut platform = LinuxPlatform::new();
    let mut gate = ConfirmationGate::new(config.force_yes, config.dry_run, Box::new(StdinPrompter));

    let summary = run_maintenance(&config, &mut ctx, &mut platform, &mut gate);
    if config.json {
        write_json_line(&summary)?;
    }
    if let Err(e) = ctx.finish() {
        eprintln!("{} {e}", "[WARN]".yellow());
    }
    Ok(summary.exit_code())
}
