//! Filesystem cleanup: thumbnails, journal, temp files, coredumps, shell history.

use std::path::PathBuf;

use crate::core::config::Settings;
use crate::core::errors::FedorableError;
use crate::platform::pal::CommandSpec;
use crate::runner::task::{TaskContext, TaskError, TaskOutcome};

/// Root's home followed by every directory under `home_root`, sorted.
pub fn user_homes(settings: &Settings) -> Result<Vec<PathBuf>, TaskError> {
    let mut homes = vec![settings.root_home.clone()];
    let entries = match std::fs::read_dir(&settings.home_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(homes),
        Err(e) => return Err(FedorableError::io(&settings.home_root, e).into()),
    };
    let mut users = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FedorableError::io(&settings.home_root, e))?;
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            users.push(entry.path());
        }
    }
    users.sort();
    homes.extend(users);
    Ok(homes)
}

pub fn clean_user_cache(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    let mut removed = 0;
    for home in user_homes(ctx.settings)? {
        let cache = home.join(".cache");
        if std::fs::symlink_metadata(&cache).is_ok_and(|m| m.file_type().is_symlink()) {
            ctx.warn(format!("Skipping {}: not a real directory", cache.display()));
            continue;
        }
        removed += ctx.remove_dir_contents(&cache.join("thumbnails"))?;
    }
    if removed == 0 {
        return Ok(TaskOutcome::Skipped("no cached thumbnails".to_string()));
    }
    ctx.info(format!("Removed {removed} thumbnail cache entr{}", if removed == 1 { "y" } else { "ies" }));
    Ok(TaskOutcome::Completed)
}

/// Vacuum by age, rotate the active files, then vacuum by size.
pub fn clean_journal(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    let by_time = format!("--vacuum-time={}", ctx.settings.journal_vacuum_time);
    let by_size = format!("--vacuum-size={}", ctx.settings.journal_vacuum_size);
    ctx.run(&CommandSpec::new("journalctl").arg(by_time))?;
    ctx.run(&CommandSpec::new("journalctl").arg("--rotate"))?;
    ctx.run(&CommandSpec::new("journalctl").arg(by_size))?;
    Ok(TaskOutcome::Completed)
}

pub fn clean_temp(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    let age = format!("+{}", ctx.settings.temp_max_age_days);
    let dirs: Vec<PathBuf> = ctx.settings.temp_dirs.iter().filter(|d| d.is_dir()).cloned().collect();
    if dirs.is_empty() {
        return Ok(TaskOutcome::Skipped("no temp directories present".to_string()));
    }
    for dir in dirs {
        ctx.run(
            &CommandSpec::new("find")
                .arg(dir.to_string_lossy())
                .args(["-xdev", "-type", "f", "-atime", age.as_str(), "-delete"]),
        )?;
    }
    Ok(TaskOutcome::Completed)
}

pub fn clean_coredumps(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    let dir = ctx.settings.coredump_dir.clone();
    match ctx.remove_dir_contents(&dir)? {
        0 => Ok(TaskOutcome::Skipped("no coredumps".to_string())),
        n => {
            ctx.info(format!("Removed {n} coredump(s) from {}", dir.display()));
            Ok(TaskOutcome::Completed)
        }
    }
}

pub fn clear_history(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if !ctx.confirm("Clear .bash_history for root and every user?") {
        ctx.warn("Shell history clearing declined; nothing changed");
        return Ok(TaskOutcome::Skipped("declined".to_string()));
    }
    let mut cleared = 0;
    for home in user_homes(ctx.settings)? {
        if ctx.truncate_file(&home.join(".bash_history"))? {
            cleared += 1;
        }
    }
    ctx.info(format!("Cleared {cleared} history file(s)"));
    Ok(TaskOutcome::Completed)
}
