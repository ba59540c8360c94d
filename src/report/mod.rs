//! End-of-run reporting: disk usage snapshots, the mailed log, and the summary.

use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use crate::core::config::RunConfiguration;
use crate::core::errors::Result;
use crate::logger::RunLogger;
use crate::platform::pal::{CommandSpec, FsStats, Platform};
use crate::runner::engine::RunSummary;

// ---------------------------------------------------------------------------
// Disk usage
// ---------------------------------------------------------------------------

/// Log the capacity of `/` under `label` and return it. A statvfs failure is a WARN.
pub fn log_disk_usage(platform: &dyn Platform, log: &mut RunLogger, label: &str) -> Option<FsStats> {
    match platform.fs_stats(Path::new("/")) {
        Ok(stats) => {
            log.info(format!("Disk usage {label}: {}", describe_usage(&stats)));
            Some(stats)
        }
        Err(e) => {
            log.warn(format!("Disk usage {label} unavailable: {e}"));
            None
        }
    }
}

#[must_use]
pub fn describe_usage(stats: &FsStats) -> String {
    format!(
        "{} used of {}, {} free ({:.1}%)",
        format_bytes(stats.used_bytes()),
        format_bytes(stats.total_bytes),
        format_bytes(stats.available_bytes),
        stats.free_pct()
    )
}

/// Log how much space the run reclaimed (or consumed).
pub fn log_disk_delta(log: &mut RunLogger, before: &FsStats, after: &FsStats) {
    if after.available_bytes >= before.available_bytes {
        log.info(format!(
            "Space reclaimed: {}",
            format_bytes(after.available_bytes - before.available_bytes)
        ));
    } else {
        log.info(format!(
            "Space consumed: {}",
            format_bytes(before.available_bytes - after.available_bytes)
        ));
    }
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    const TIB: u64 = 1024 * GIB;

    if bytes >= TIB {
        format!("{:.1} TB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

/// Build the mail command for `body`: `mail -s` when available, else `sendmail -t`.
#[must_use]
pub fn mail_command(platform: &dyn Platform, recipient: &str, subject: &str, body: &str) -> Option<CommandSpec> {
    if platform.has_program("mail") {
        return Some(
            CommandSpec::new("mail")
                .args(["-s", subject, recipient])
                .stdin(body),
        );
    }
    if platform.has_program("sendmail") {
        let message = format!("To: {recipient}\nSubject: {subject}\n\n{body}");
        return Some(CommandSpec::new("sendmail").arg("-t").stdin(message));
    }
    None
}

/// Mail the run log. Every failure here is a WARN; reporting never fails a run.
pub fn send_email_report(platform: &mut dyn Platform, log: &mut RunLogger, config: &RunConfiguration) {
    let body = match std::fs::read_to_string(log.path()) {
        Ok(body) => body,
        Err(e) => {
            log.warn(format!("Email report skipped: cannot read log file: {e}"));
            return;
        }
    };
    let Some(command) = mail_command(&*platform, &config.email_recipient, &config.email_subject, &body) else {
        log.warn("Email report skipped: neither `mail` nor `sendmail` is installed");
        return;
    };
    match platform.run(&command) {
        Ok(out) if out.success() => {
            log.info(format!("Email report sent to {} via {}", config.email_recipient, command.program));
        }
        Ok(out) => log.warn(format!(
            "Email report via {} failed with status {}",
            command.program, out.exit_code
        )),
        Err(e) => log.warn(format!("Email report failed: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[must_use]
pub fn format_summary(summary: &RunSummary) -> String {
    let failed: Vec<String> = summary
        .tasks
        .iter()
        .filter(|t| !t.succeeded)
        .map(|t| t.name.to_string())
        .collect();
    let mut line = format!(
        "Maintenance {} with {} error(s) and {} warning(s) in {}",
        if summary.dry_run { "dry run completed" } else { "completed" },
        summary.errors,
        summary.warnings,
        format_duration(Duration::from_secs(summary.elapsed_secs)),
    );
    if !failed.is_empty() {
        line.push_str(&format!("; failed: {}", failed.join(", ")));
    }
    line
}

/// Log the summary line; SUCCESS only for a clean run. Counters are not touched.
pub fn log_summary(log: &mut RunLogger, summary: &RunSummary) {
    let line = format_summary(summary);
    if summary.errors == 0 {
        log.success(line);
    } else {
        log.info(line);
    }
    log.info(format!("Log file: {}", summary.log_file));
}

pub fn write_json_line(summary: &RunSummary) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, summary)?;
    writeln!(stdout).map_err(|e| crate::core::errors::FedorableError::io("<stdout>", e))?;
    Ok(())
}
