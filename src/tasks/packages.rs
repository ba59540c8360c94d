//! Package updates and package-level cleanup: dnf, fwupd, kernels, Flatpak, Snap.

use std::path::Path;

use crate::platform::pal::CommandSpec;
use crate::platform::queries::{self, UpdateCheck};
use crate::report::format_bytes;
use crate::runner::task::{TaskContext, TaskError, TaskOutcome};

const MIB: u64 = 1024 * 1024;

fn declined(ctx: &mut TaskContext<'_>, what: &str) -> Result<TaskOutcome, TaskError> {
    ctx.warn(format!("{what} declined; nothing changed"));
    Ok(TaskOutcome::Skipped("declined".to_string()))
}

fn not_installed(program: &str) -> Result<TaskOutcome, TaskError> {
    Ok(TaskOutcome::Skipped(format!("{program} is not installed")))
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// Refuse to upgrade with less than `min_free_space_mb` available on `/`.
pub fn enough_free_space(ctx: &mut TaskContext<'_>) -> Result<(), TaskError> {
    let stats = ctx.platform.fs_stats(Path::new("/"))?;
    let needed = ctx.settings.min_free_space_mb.saturating_mul(MIB);
    if stats.available_bytes < needed {
        return Err(TaskError::Precondition(format!(
            "only {} free on /, at least {} required",
            format_bytes(stats.available_bytes),
            format_bytes(needed)
        )));
    }
    Ok(())
}

pub fn update(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    let check = queries::interpret_check_update(&ctx.query(&queries::check_update_command())?);
    let packages = match check {
        UpdateCheck::UpToDate => {
            return Ok(TaskOutcome::Skipped("system is up to date".to_string()));
        }
        UpdateCheck::Failed(exit_code) => {
            return Err(TaskError::Command {
                command: queries::check_update_command().display(),
                exit_code,
            });
        }
        UpdateCheck::Available(packages) => packages,
    };

    ctx.info(format!("{} package update(s) available", packages.len()));
    if !ctx.confirm(&format!("Install {} package update(s)?", packages.len())) {
        return declined(ctx, "Package update");
    }
    ctx.run(&CommandSpec::new("dnf").args(["upgrade", "-y", "--refresh"]))?;
    Ok(TaskOutcome::Completed)
}

pub fn update_firmware(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if !ctx.has_program("fwupdmgr") {
        return not_installed("fwupdmgr");
    }

    let refresh = CommandSpec::new("fwupdmgr").args(["refresh", "--force"]);
    let out = ctx.execute(&refresh)?;
    if !out.success() {
        ctx.warn(format!("`{refresh}` exited with status {}; using cached metadata", out.exit_code));
    }

    // fwupdmgr exits 2 when there is nothing to do.
    let listing = CommandSpec::new("fwupdmgr").arg("get-updates").read_only();
    let out = ctx.query(&listing)?;
    match out.exit_code {
        0 => {}
        2 => return Ok(TaskOutcome::Skipped("no firmware updates available".to_string())),
        exit_code => {
            return Err(TaskError::Command {
                command: listing.display(),
                exit_code,
            });
        }
    }

    if !ctx.confirm("Apply available firmware updates?") {
        return declined(ctx, "Firmware update");
    }
    ctx.run(&CommandSpec::new("fwupdmgr").args(["update", "-y", "--no-reboot-check"]))?;
    Ok(TaskOutcome::Completed)
}

/// `--check-only`: report pending package (and Flatpak) updates without acting.
///
/// Returns whether anything is pending. A failed check is an error; pending
/// updates are not.
pub fn check_only(ctx: &mut TaskContext<'_>) -> Result<bool, TaskError> {
    let mut pending = false;
    match queries::interpret_check_update(&ctx.query(&queries::check_update_command())?) {
        UpdateCheck::UpToDate => ctx.info("No package updates available"),
        UpdateCheck::Available(packages) => {
            pending = true;
            ctx.info(format!("{} package update(s) available:", packages.len()));
            for package in &packages {
                ctx.info(format!("  {package}"));
            }
        }
        UpdateCheck::Failed(exit_code) => {
            return Err(TaskError::Command {
                command: queries::check_update_command().display(),
                exit_code,
            });
        }
    }

    if ctx.has_program("flatpak") {
        let out = ctx.query(&CommandSpec::new("flatpak").args(["remote-ls", "--updates"]))?;
        let refs = out.lines().count();
        if !out.success() {
            ctx.warn(format!("flatpak update check exited with status {}", out.exit_code));
        } else if refs == 0 {
            ctx.info("No Flatpak updates available");
        } else {
            pending = true;
            ctx.info(format!("{refs} Flatpak update(s) available"));
        }
    }
    Ok(pending)
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

pub fn autoremove(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if !ctx.confirm("Remove packages that are no longer required?") {
        return declined(ctx, "Autoremove");
    }
    ctx.run(&CommandSpec::new("dnf").args(["autoremove", "-y"]))?;
    Ok(TaskOutcome::Completed)
}

pub fn clean_dnf(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    ctx.run(&CommandSpec::new("dnf").args(["clean", "all"]))?;
    ctx.run(&CommandSpec::new("dnf").arg("makecache"))?;
    Ok(TaskOutcome::Completed)
}

/// Keep the newest `kernel_retention` kernels. At or under the limit nothing
/// is asked and nothing removed.
pub fn clean_kernels(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    let keep = ctx.settings.kernel_retention;
    let installed = queries::installed_kernels(ctx.platform)?;
    if installed.len() <= keep as usize {
        return Ok(TaskOutcome::Skipped(format!(
            "{} kernel(s) installed, retention is {keep}",
            installed.len()
        )));
    }

    let candidates = queries::old_kernel_candidates(ctx.platform, keep)?;
    ctx.info(format!(
        "{} kernel(s) installed; keeping the newest {keep}.",
        installed.len()
    ));
    let prompt = if candidates.is_empty() {
        // dnf still picks the packages itself; only the listing is missing.
        ctx.info("Removal preview unavailable");
        format!("Remove old kernel packages, keeping the newest {keep}?")
    } else {
        ctx.info("Removal candidates:");
        for package in &candidates {
            ctx.info(format!("  {package}"));
        }
        format!("Remove {} old kernel package(s)?", candidates.len())
    };

    if !ctx.confirm(&prompt) {
        return declined(ctx, "Kernel cleanup");
    }
    ctx.run(
        &CommandSpec::new("dnf")
            .args(["remove", "-y", "--oldinstallonly"])
            .arg(format!("--setopt=installonly_limit={keep}")),
    )?;
    Ok(TaskOutcome::Completed)
}

pub fn clean_flatpak(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if !ctx.has_program("flatpak") {
        return not_installed("flatpak");
    }
    ctx.run(&CommandSpec::new("flatpak").args(["update", "-y", "--noninteractive"]))?;
    ctx.run(&CommandSpec::new("flatpak").args(["uninstall", "--unused", "-y", "--noninteractive"]))?;
    Ok(TaskOutcome::Completed)
}

pub fn clean_snap(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if !ctx.has_program("snap") {
        return not_installed("snap");
    }
    let revisions = queries::disabled_snaps(ctx.platform)?;
    if revisions.is_empty() {
        return Ok(TaskOutcome::Skipped("no disabled snap revisions".to_string()));
    }
    let mut first_failure = None;
    for rev in &revisions {
        let removal = ctx.run(
            &CommandSpec::new("snap")
                .args(["remove", rev.name.as_str()])
                .arg(format!("--revision={}", rev.revision)),
        );
        if let Err(e) = removal {
            if first_failure.is_none() {
                first_failure = Some(e);
            }
        }
    }
    if let Some(e) = first_failure {
        return Err(e);
    }
    ctx.info(format!("Removed {} disabled snap revision(s)", revisions.len()));
    Ok(TaskOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use crate::core::task_id::TaskId;
    use crate::platform::pal::{CommandOutput, FsStats};
    use crate::platform::scripted::ScriptedPlatform;
    use crate::tasks::harness::Harness;

    fn kernels(n: usize) -> CommandOutput {
        CommandOutput::ok(
            (0..n)
                .map(|i| format!("kernel-core-6.{i}.0-200.fc41.x86_64\n"))
                .collect::<String>(),
        )
    }

    #[test]
    fn update_skips_when_up_to_date() {
        let mut h = Harness::new(ScriptedPlatform::new());
        let result = h.run(TaskId::Update);
        assert!(result.succeeded);
        assert_eq!(h.platform.command_lines(), vec!["dnf check-update"]);
        assert_eq!(h.gate.requests(), 0);
    }

    #[test]
    fn update_confirms_then_upgrades() {
        let platform = ScriptedPlatform::new().respond(
            "dnf check-update",
            CommandOutput {
                exit_code: 100,
                stdout: "kernel.x86_64  6.11.4-301.fc41  updates\n".into(),
                stderr: String::new(),
            },
        );
        let mut h = Harness::with_answers(platform, &["y"]);
        assert!(h.run(TaskId::Update).succeeded);
        assert_eq!(
            h.platform.command_lines(),
            vec!["dnf check-update", "dnf upgrade -y --refresh"]
        );
    }

    #[test]
    fn declined_update_changes_nothing() {
        let platform = ScriptedPlatform::new().respond("dnf check-update", CommandOutput::status(100));
        let mut h = Harness::with_answers(platform, &["n"]);
        let result = h.run(TaskId::Update);
        assert!(result.succeeded);
        assert!(h.platform.mutating_calls().is_empty());
        assert_eq!(h.log.error_count(), 0);
        assert_eq!(h.log.warning_count(), 1);
    }

    #[test]
    fn update_precondition_blocks_on_low_space() {
        let platform = ScriptedPlatform::new().with_fs_stats(FsStats {
            total_bytes: 10 * 1024 * 1024 * 1024,
            available_bytes: 100 * 1024 * 1024,
        });
        let mut h = Harness::new(platform);
        let result = h.run(TaskId::Update);
        assert!(!result.attempted);
        assert!(h.platform.calls().is_empty());
        assert_eq!(h.log.error_count(), 1);
        assert!(h.log_text().contains("precondition failed"));
    }

    #[test]
    fn failed_update_check_is_an_error() {
        let platform = ScriptedPlatform::new().respond("dnf check-update", CommandOutput::status(1));
        let mut h = Harness::new(platform);
        let result = h.run(TaskId::Update);
        assert!(!result.succeeded);
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn kernels_at_retention_is_a_no_op() {
        let platform = ScriptedPlatform::new().respond("rpm -q kernel-core", kernels(2));
        let mut h = Harness::new(platform);
        assert!(h.run(TaskId::CleanKernels).succeeded);
        assert_eq!(h.gate.requests(), 0);
        assert!(h.platform.mutating_calls().is_empty());
        assert_eq!(h.platform.count_of("dnf"), 0);
    }

    #[test]
    fn kernels_over_retention_prompt_once_and_remove() {
        let platform = ScriptedPlatform::new()
            .respond("rpm -q kernel-core", kernels(4))
            .respond(
                "dnf repoquery",
                CommandOutput::ok("kernel-core-6.0.0-200.fc41.x86_64\nkernel-core-6.1.0-200.fc41.x86_64\n"),
            );
        let mut h = Harness::with_answers(platform, &["yes"]);
        assert!(h.run(TaskId::CleanKernels).succeeded);
        assert_eq!(h.gate.requests(), 1);
        let removals: Vec<String> = h
            .platform
            .mutating_calls()
            .iter()
            .map(|c| c.display())
            .collect();
        assert_eq!(
            removals,
            vec!["dnf remove -y --oldinstallonly --setopt=installonly_limit=2"]
        );
        assert!(h.log_text().contains("kernel-core-6.0.0-200.fc41.x86_64"));
    }

    #[test]
    fn three_kernels_over_two_prompt_once_without_a_preview() {
        let platform = ScriptedPlatform::new().respond("rpm -q kernel-core", kernels(3));
        let mut h = Harness::with_answers(platform, &["y"]);
        assert!(h.run(TaskId::CleanKernels).succeeded);
        assert_eq!(h.gate.requests(), 1);
        let removals: Vec<String> = h
            .platform
            .mutating_calls()
            .iter()
            .map(|c| c.display())
            .collect();
        assert_eq!(
            removals,
            vec!["dnf remove -y --oldinstallonly --setopt=installonly_limit=2"]
        );
        assert!(h.log_text().contains("Removal preview unavailable"));
    }

    #[test]
    fn firmware_exit_two_means_nothing_to_do() {
        let platform = ScriptedPlatform::new().respond("fwupdmgr get-updates", CommandOutput::status(2));
        let mut h = Harness::new(platform);
        assert!(h.run(TaskId::UpdateFirmware).succeeded);
        assert_eq!(h.gate.requests(), 0);
        assert_eq!(h.platform.count_of("fwupdmgr update"), 0);
    }

    #[test]
    fn firmware_refresh_failure_is_only_a_warning() {
        let platform = ScriptedPlatform::new().respond("fwupdmgr refresh", CommandOutput::status(1));
        let mut h = Harness::with_answers(platform, &["y"]);
        assert!(h.run(TaskId::UpdateFirmware).succeeded);
        assert_eq!(h.log.warning_count(), 1);
        assert_eq!(h.platform.count_of("fwupdmgr update -y --no-reboot-check"), 1);
    }

    #[test]
    fn missing_tools_skip_cleanly() {
        let platform = ScriptedPlatform::new()
            .without_program("flatpak")
            .without_program("snap")
            .without_program("fwupdmgr");
        let mut h = Harness::new(platform);
        for id in [TaskId::CleanFlatpak, TaskId::CleanSnap, TaskId::UpdateFirmware] {
            assert!(h.run(id).succeeded);
        }
        assert!(h.platform.calls().is_empty());
        assert_eq!(h.log.error_count(), 0);
    }

    #[test]
    fn snap_removes_each_disabled_revision() {
        let platform = ScriptedPlatform::new().respond(
            "snap list --all",
            CommandOutput::ok(
                "Name  Version  Rev  Tracking  Publisher  Notes\ncore  16-2.61  16202  latest/stable  canonical  core,disabled\n",
            ),
        );
        let mut h = Harness::new(platform);
        assert!(h.run(TaskId::CleanSnap).succeeded);
        assert_eq!(h.platform.count_of("snap remove core --revision=16202"), 1);
    }

    #[test]
    fn snap_failure_does_not_stop_later_revisions() {
        let platform = ScriptedPlatform::new()
            .respond(
                "snap list --all",
                CommandOutput::ok(
                    "Name  Version  Rev  Tracking  Publisher  Notes\n\
                     core  16-2.61  16202  latest/stable  canonical  core,disabled\n\
                     lxd   5.21     28460  5.21/stable    canonical  disabled\n",
                ),
            )
            .respond("snap remove core", CommandOutput::status(1));
        let mut h = Harness::new(platform);
        let result = h.run(TaskId::CleanSnap);
        assert!(!result.succeeded);
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(h.platform.count_of("snap remove lxd --revision=28460"), 1);
        assert_eq!(h.log.error_count(), 1);
    }

    #[test]
    fn clean_dnf_runs_clean_then_makecache() {
        let mut h = Harness::new(ScriptedPlatform::new());
        assert!(h.run(TaskId::CleanDnf).succeeded);
        assert_eq!(h.platform.command_lines(), vec!["dnf clean all", "dnf makecache"]);
    }
}
