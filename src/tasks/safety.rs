//! Safety tier: Timeshift snapshots and configuration backups, taken before any
//! other task changes the system.

use chrono::Local;

use crate::platform::pal::CommandSpec;
use crate::platform::queries;
use crate::runner::task::{TaskContext, TaskError, TaskOutcome};

/// Prune tagged snapshots down to `snapshot_retention - 1`, then create one.
pub fn timeshift(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if !ctx.has_program("timeshift") {
        return Ok(TaskOutcome::Skipped("timeshift is not installed".to_string()));
    }
    let tag = ctx.settings.snapshot_tag.clone();
    let tagged = queries::tagged_snapshots(ctx.platform, &tag)?;
    let prune = queries::snapshots_to_prune(&tagged, ctx.settings.snapshot_retention);
    if !prune.is_empty() {
        ctx.info(format!(
            "{} {tag} snapshot(s) present; pruning {} oldest",
            tagged.len(),
            prune.len()
        ));
    }
    for name in &prune {
        ctx.run(
            &CommandSpec::new("timeshift")
                .args(["--delete", "--snapshot", name.as_str(), "--scripted"]),
        )?;
    }

    ctx.run(
        &CommandSpec::new("timeshift")
            .args(["--create", "--comments"])
            .arg(format!("{tag} pre-maintenance"))
            .args(["--tags", "D", "--scripted"]),
    )?;
    Ok(TaskOutcome::Completed)
}

/// Copy the configured paths and package inventories into a timestamped directory.
pub fn backup(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    let dir = ctx
        .settings
        .backup_dir
        .join(format!("backup_{}", Local::now().format("%Y%m%d_%H%M%S")));
    ctx.create_dir(&dir)?;

    let dest = format!("{}/", dir.display());
    for path in ctx.settings.backup_paths.clone() {
        if !ctx.path_exists(&path) {
            ctx.info(format!("Backup: {} does not exist, skipping", path.display()));
            continue;
        }
        ctx.run(
            &CommandSpec::new("cp")
                .args(["-a", "--parents"])
                .arg(path.to_string_lossy())
                .arg(dest.as_str()),
        )?;
    }

    let packages = ctx.query(&CommandSpec::new("rpm").arg("-qa"))?;
    let mut names: Vec<&str> = packages.lines().collect();
    names.sort_unstable();
    ctx.write_file(&dir.join("packages.txt"), &(names.join("\n") + "\n"))?;

    if ctx.has_program("flatpak") {
        let apps = ctx.query(&CommandSpec::new("flatpak").args(["list", "--app", "--columns=application"]))?;
        let listing: Vec<&str> = apps.lines().collect();
        ctx.write_file(&dir.join("flatpaks.txt"), &(listing.join("\n") + "\n"))?;
    }

    ctx.info(format!("Backup written to {}", dir.display()));
    Ok(TaskOutcome::Completed)
}
