//! Read-only queries against external tools and the parsers for their output.
//!
//! Where a tool offers a machine-readable format (`rpm --queryformat`,
//! `systemctl --plain --no-legend`) it is used; the remaining text scraping
//! (`timeshift --list`, `snap list --all`, `dnf check-update`) lives here and
//! nowhere else.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::Result;
use crate::platform::pal::{CommandOutput, CommandSpec, Platform};

static TIMESHIFT_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+\s+>?\s*(\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2})(?:\s+([BHDWMO]*)\s*(.*))?$")
        .expect("static regex")
});

static DNF_UPDATE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\.(\S+)\s+(\S+)\s+(\S+)\s*$").expect("static regex")
});

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

/// `rpm` query listing every installed kernel, one NEVRA per line.
#[must_use]
pub fn installed_kernels_command() -> CommandSpec {
    CommandSpec::new("rpm")
        .args(["-q", "kernel-core", "--queryformat"])
        .arg("%{NAME}-%{VERSION}-%{RELEASE}.%{ARCH}\\n")
        .read_only()
}

/// Installed kernel packages. `rpm` exits non-zero when none are installed.
pub fn installed_kernels(platform: &mut dyn Platform) -> Result<Vec<String>> {
    let out = platform.run(&installed_kernels_command())?;
    if !out.success() {
        return Ok(Vec::new());
    }
    Ok(out
        .lines()
        .filter(|l| !l.contains("not installed"))
        .map(str::to_string)
        .collect())
}

/// Install-only packages outside the newest `keep` (what `dnf` would remove).
pub fn old_kernel_candidates(platform: &mut dyn Platform, keep: u32) -> Result<Vec<String>> {
    let out = platform.run(
        &CommandSpec::new("dnf")
            .args(["repoquery", "--installonly"])
            .arg(format!("--latest-limit=-{keep}"))
            .arg("-q")
            .read_only(),
    )?;
    Ok(out.lines().map(str::to_string).collect())
}

// ---------------------------------------------------------------------------
// Package updates
// ---------------------------------------------------------------------------

/// Outcome of `dnf check-update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    UpToDate,
    Available(Vec<String>),
    Failed(i32),
}

#[must_use]
pub fn check_update_command() -> CommandSpec {
    CommandSpec::new("dnf").arg("check-update").read_only()
}

/// Interpret `dnf check-update`: exit 0 = nothing, 100 = updates, anything else failed.
#[must_use]
pub fn interpret_check_update(out: &CommandOutput) -> UpdateCheck {
    match out.exit_code {
        0 => UpdateCheck::UpToDate,
        100 => UpdateCheck::Available(parse_check_update(&out.stdout)),
        code => UpdateCheck::Failed(code),
    }
}

/// Package names from a `dnf check-update` listing, stopping at the obsoletes section.
#[must_use]
pub fn parse_check_update(stdout: &str) -> Vec<String> {
    let mut packages = Vec::new();
    for line in stdout.lines() {
        if line.trim_start().starts_with("Obsoleting") {
            break;
        }
        if let Some(caps) = DNF_UPDATE_ROW.captures(line) {
            packages.push(format!("{}.{}", &caps[1], &caps[2]));
        }
    }
    packages
}

// ---------------------------------------------------------------------------
// Timeshift
// ---------------------------------------------------------------------------

/// One row of `timeshift --list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Timestamp name, e.g. `2024-01-10_10-00-01`; sorts chronologically.
    pub name: String,
    pub tags: String,
    pub description: String,
}

#[must_use]
pub fn parse_timeshift_list(stdout: &str) -> Vec<Snapshot> {
    stdout
        .lines()
        .filter_map(|line| TIMESHIFT_ROW.captures(line))
        .map(|caps| {
            let field = |i: usize| caps.get(i).map_or("", |m| m.as_str().trim());
            Snapshot {
                name: caps[1].to_string(),
                tags: field(2).to_string(),
                description: field(3).to_string(),
            }
        })
        .collect()
}

/// Snapshots whose description carries `tag`, oldest first.
pub fn tagged_snapshots(platform: &mut dyn Platform, tag: &str) -> Result<Vec<Snapshot>> {
    let out = platform.run(
        &CommandSpec::new("timeshift")
            .args(["--list", "--scripted"])
            .read_only(),
    )?;
    let mut snapshots: Vec<Snapshot> = parse_timeshift_list(&out.stdout)
        .into_iter()
        .filter(|s| s.description.split_whitespace().any(|word| word == tag))
        .collect();
    snapshots.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(snapshots)
}

/// Names to delete so that at most `limit - 1` tagged snapshots remain.
#[must_use]
pub fn snapshots_to_prune(oldest_first: &[Snapshot], limit: u32) -> Vec<String> {
    let keep = usize::try_from(limit.saturating_sub(1)).unwrap_or(usize::MAX);
    let excess = oldest_first.len().saturating_sub(keep);
    oldest_first[..excess].iter().map(|s| s.name.clone()).collect()
}

// ---------------------------------------------------------------------------
// Snap
// ---------------------------------------------------------------------------

/// A disabled snap revision eligible for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapRevision {
    pub name: String,
    pub revision: String,
}

#[must_use]
pub fn parse_disabled_snaps(stdout: &str) -> Vec<SnapRevision> {
    stdout
        .lines()
        .skip_while(|line| !line.starts_with("Name"))
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let notes = cols.last()?;
            if cols.len() < 4 || !notes.split(',').any(|n| n == "disabled") {
                return None;
            }
            Some(SnapRevision {
                name: cols[0].to_string(),
                revision: cols[2].to_string(),
            })
        })
        .collect()
}

pub fn disabled_snaps(platform: &mut dyn Platform) -> Result<Vec<SnapRevision>> {
    let out = platform.run(&CommandSpec::new("snap").args(["list", "--all"]).read_only())?;
    Ok(parse_disabled_snaps(&out.stdout))
}

// ---------------------------------------------------------------------------
// systemd
// ---------------------------------------------------------------------------

#[must_use]
pub fn parse_failed_units(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            line.split_whitespace()
                .find(|tok| *tok != "●" && *tok != "*")
                .map(str::to_string)
        })
        .collect()
}

pub fn failed_units(platform: &mut dyn Platform) -> Result<Vec<String>> {
    let out = platform.run(
        &CommandSpec::new("systemctl")
            .args(["--failed", "--no-legend", "--plain"])
            .read_only(),
    )?;
    Ok(parse_failed_units(&out.stdout))
}
