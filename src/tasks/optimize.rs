//! Configuration and optimization tier.

use std::path::Path;

use crate::platform::pal::{CommandSpec, Platform};
use crate::runner::task::{TaskContext, TaskError, TaskOutcome};

const EFI_FIRMWARE_DIR: &str = "/sys/firmware/efi";
const EFI_GRUB_CFG: &str = "/boot/efi/EFI/fedora/grub.cfg";
const BIOS_GRUB_CFG: &str = "/boot/grub2/grub.cfg";

/// Where `grub2-mkconfig` should write for this boot mode.
#[must_use]
pub fn grub_config_path(platform: &dyn Platform) -> &'static str {
    if platform.path_exists(Path::new(EFI_FIRMWARE_DIR)) && platform.path_exists(Path::new(EFI_GRUB_CFG)) {
        EFI_GRUB_CFG
    } else {
        BIOS_GRUB_CFG
    }
}

pub fn update_grub(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if ctx.has_program("update-grub") {
        let wrapper = CommandSpec::new("update-grub");
        let out = ctx.execute(&wrapper)?;
        if out.success() {
            return Ok(TaskOutcome::Completed);
        }
        ctx.warn(format!(
            "update-grub exited with status {}; falling back to grub2-mkconfig",
            out.exit_code
        ));
    }
    let target = grub_config_path(&*ctx.platform);
    ctx.run(&CommandSpec::new("grub2-mkconfig").args(["-o", target]))?;
    Ok(TaskOutcome::Completed)
}

pub fn optimize_rpmdb(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    ctx.run(&CommandSpec::new("rpm").arg("--rebuilddb"))?;
    Ok(TaskOutcome::Completed)
}

pub fn reset_failed_units(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    ctx.run(&CommandSpec::new("systemctl").arg("reset-failed"))?;
    Ok(TaskOutcome::Completed)
}

pub fn update_fonts(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if !ctx.has_program("fc-cache") {
        return Ok(TaskOutcome::Skipped("fc-cache is not installed".to_string()));
    }
    ctx.run(&CommandSpec::new("fc-cache").arg("-f"))?;
    Ok(TaskOutcome::Completed)
}

pub fn trim(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    ctx.run(&CommandSpec::new("fstrim").arg("-av"))?;
    Ok(TaskOutcome::Completed)
}

pub fn optimize_fstrim(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    let state = ctx.query(&CommandSpec::new("systemctl").args(["is-enabled", "fstrim.timer"]))?;
    if state.success() && state.stdout.trim() == "enabled" {
        return Ok(TaskOutcome::Skipped("fstrim.timer is already enabled".to_string()));
    }
    ctx.run(&CommandSpec::new("systemctl").args(["enable", "--now", "fstrim.timer"]))?;
    Ok(TaskOutcome::Completed)
}

pub fn update_mandb(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    if !ctx.has_program("mandb") {
        return Ok(TaskOutcome::Skipped("mandb is not installed".to_string()));
    }
    ctx.run(&CommandSpec::new("mandb").arg("-q"))?;
    Ok(TaskOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task_id::TaskId;
    use crate::platform::pal::CommandOutput;
    use crate::platform::scripted::ScriptedPlatform;
    use crate::tasks::harness::Harness;

    #[test]
    fn grub_target_follows_boot_mode() {
        let bios = ScriptedPlatform::new();
        assert_eq!(grub_config_path(&bios), BIOS_GRUB_CFG);
        let efi_without_cfg = ScriptedPlatform::new().with_path(EFI_FIRMWARE_DIR);
        assert_eq!(grub_config_path(&efi_without_cfg), BIOS_GRUB_CFG);
        let efi = ScriptedPlatform::new()
            .with_path(EFI_FIRMWARE_DIR)
            .with_path(EFI_GRUB_CFG);
        assert_eq!(grub_config_path(&efi), EFI_GRUB_CFG);
    }

    #[test]
    fn update_grub_wrapper_is_preferred() {
        let mut h = Harness::new(ScriptedPlatform::new());
        assert!(h.run(TaskId::UpdateGrub).succeeded);
        assert_eq!(h.platform.command_lines(), vec!["update-grub"]);
    }

    #[test]
    fn update_grub_falls_back_to_mkconfig() {
        let platform = ScriptedPlatform::new().respond("update-grub", CommandOutput::status(127));
        let mut h = Harness::new(platform);
        assert!(h.run(TaskId::UpdateGrub).succeeded);
        assert_eq!(
            h.platform.command_lines(),
            vec!["update-grub", "grub2-mkconfig -o /boot/grub2/grub.cfg"]
        );
        assert_eq!(h.log.warning_count(), 1);

        let platform = ScriptedPlatform::new().without_program("update-grub");
        let mut h = Harness::new(platform);
        assert!(h.run(TaskId::UpdateGrub).succeeded);
        assert_eq!(h.platform.command_lines(), vec!["grub2-mkconfig -o /boot/grub2/grub.cfg"]);
    }

    #[test]
    fn fstrim_timer_enabled_only_when_needed() {
        let platform = ScriptedPlatform::new()
            .respond("systemctl is-enabled fstrim.timer", CommandOutput::ok("enabled\n"));
        let mut h = Harness::new(platform);
        assert!(h.run(TaskId::OptimizeFstrim).succeeded);
        assert!(h.platform.mutating_calls().is_empty());

        let platform = ScriptedPlatform::new().respond(
            "systemctl is-enabled fstrim.timer",
            CommandOutput {
                exit_code: 1,
                stdout: "disabled\n".into(),
                stderr: String::new(),
            },
        );
        let mut h = Harness::new(platform);
        assert!(h.run(TaskId::OptimizeFstrim).succeeded);
        assert_eq!(h.platform.count_of("systemctl enable --now fstrim.timer"), 1);
    }

    #[test]
    fn simple_tasks_issue_one_command() {
        for (id, expected) in [
            (TaskId::OptimizeRpmdb, "rpm --rebuilddb"),
            (TaskId::ResetFailedUnits, "systemctl reset-failed"),
            (TaskId::UpdateFonts, "fc-cache -f"),
            (TaskId::Trim, "fstrim -av"),
            (TaskId::UpdateMandb, "mandb -q"),
        ] {
            let mut h = Harness::new(ScriptedPlatform::new());
            assert!(h.run(id).succeeded, "{id}");
            assert_eq!(h.platform.command_lines(), vec![expected]);
        }
    }

    #[test]
    fn trim_failure_is_reported_with_status() {
        let platform = ScriptedPlatform::new().respond("fstrim", CommandOutput::status(32));
        let mut h = Harness::new(platform);
        let result = h.run(TaskId::Trim);
        assert!(!result.succeeded);
        assert_eq!(result.exit_code, Some(32));
        assert_eq!(h.log.error_count(), 1);
    }
}
