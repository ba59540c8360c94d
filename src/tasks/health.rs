//! Read-only health reporting.

use crate::platform::queries;
use crate::runner::task::{TaskContext, TaskError, TaskOutcome};

/// Report failed systemd units. Failed units are warnings; the task succeeds.
pub fn check_services(ctx: &mut TaskContext<'_>) -> Result<TaskOutcome, TaskError> {
    let failed = queries::failed_units(ctx.platform)?;
    if failed.is_empty() {
        ctx.info("No failed systemd units");
    }
    for unit in &failed {
        ctx.warn(format!("Failed unit: {unit}"));
    }
    Ok(TaskOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use crate::core::task_id::TaskId;
    use crate::platform::pal::CommandOutput;
    use crate::platform::scripted::ScriptedPlatform;
    use crate::tasks::harness::Harness;

    #[test]
    fn failed_units_are_warnings_not_errors() {
        let platform = ScriptedPlatform::new().respond(
            "systemctl --failed",
            CommandOutput::ok("nginx.service loaded failed failed nginx\nbluetooth.service loaded failed failed Bluetooth\n"),
        );
        let mut h = Harness::new(platform);
        assert!(h.run(TaskId::CheckServices).succeeded);
        assert_eq!(h.log.warning_count(), 2);
        assert_eq!(h.log.error_count(), 0);
        assert!(h.log_text().contains("Failed unit: bluetooth.service"));
    }

    #[test]
    fn runs_even_under_dry_run() {
        let mut h = Harness::new(ScriptedPlatform::new()).dry_run();
        assert!(h.run(TaskId::CheckServices).succeeded);
        assert_eq!(h.platform.command_lines(), vec!["systemctl --failed --no-legend --plain"]);
    }
}
