//! Run orchestration: confirmation, locking, interrupt cleanup, and task execution.

pub mod confirm;
pub mod context;
pub mod engine;
pub mod lock;
pub mod signals;
pub mod task;

use chrono::SecondsFormat;

use crate::core::config::RunConfiguration;
use crate::platform::pal::Platform;
use crate::report;
use crate::runner::confirm::ConfirmationGate;
use crate::runner::context::RunContext;
use crate::runner::engine::{RunSummary, TaskRunner};
use crate::runner::task::TaskContext;
use crate::tasks;

/// Everything after startup checks: disk snapshots, tasks (or the update check),
/// the summary, and the optional email report.
pub fn run_maintenance(
    config: &RunConfiguration,
    ctx: &mut RunContext,
    platform: &mut dyn Platform,
    gate: &mut ConfirmationGate,
) -> RunSummary {
    ctx.log.info(format!(
        "fedorable {} starting (pid {})",
        env!("CARGO_PKG_VERSION"),
        std::process::id()
    ));
    if config.dry_run {
        ctx.log.info("Dry run: no changes will be made");
    }
    let before = report::log_disk_usage(&*platform, &mut ctx.log, "before");

    let results = if config.check_only {
        let mut task_ctx = TaskContext {
            settings: &config.settings,
            dry_run: true,
            log: &mut ctx.log,
            platform: &mut *platform,
            gate: &mut *gate,
        };
        match tasks::packages::check_only(&mut task_ctx) {
            Ok(true) => task_ctx.info("Updates are available; run without --check-only to apply"),
            Ok(false) => task_ctx.success("System is up to date"),
            Err(e) => task_ctx.log.error(format!("update check failed: {e}")),
        }
        Vec::new()
    } else {
        let enabled = config.tasks.enabled_tasks();
        if enabled.is_empty() {
            ctx.log.warn("No tasks enabled; nothing to do");
        }
        TaskRunner::new(config, &mut *platform, &mut *gate).run_all(&tasks::catalog(), &enabled, &mut ctx.log)
    };

    let after = report::log_disk_usage(&*platform, &mut ctx.log, "after");
    if let (Some(before), Some(after)) = (before, after) {
        report::log_disk_delta(&mut ctx.log, &before, &after);
    }

    let summary = RunSummary {
        started_at: ctx.started_at().to_rfc3339_opts(SecondsFormat::Secs, false),
        elapsed_secs: ctx.elapsed().as_secs(),
        dry_run: config.dry_run,
        check_only: config.check_only,
        errors: ctx.log.error_count(),
        warnings: ctx.log.warning_count(),
        log_file: ctx.log_file_path().display().to_string(),
        tasks: results,
    };
    report::log_summary(&mut ctx.log, &summary);

    if config.email_report {
        report::send_email_report(platform, &mut ctx.log, config);
    }
    summary
}
