//! Fail-soft sequential execution of the enabled tasks.

use serde::Serialize;

use crate::core::config::{RunConfiguration, Settings};
use crate::core::task_id::TaskId;
use crate::logger::RunLogger;
use crate::platform::pal::Platform;
use crate::runner::confirm::ConfirmationGate;
use crate::runner::task::{Task, TaskContext, TaskOutcome, TaskResult};

/// Runs catalog tasks in order against one platform, gate and logger.
pub struct TaskRunner<'a> {
    settings: &'a Settings,
    dry_run: bool,
    platform: &'a mut dyn Platform,
    gate: &'a mut ConfirmationGate,
}

impl<'a> TaskRunner<'a> {
    #[must_use]
    pub fn new(
        config: &'a RunConfiguration,
        platform: &'a mut dyn Platform,
        gate: &'a mut ConfirmationGate,
    ) -> Self {
        Self {
            settings: &config.settings,
            dry_run: config.dry_run,
            platform,
            gate,
        }
    }

    /// Run every task in `catalog` whose id is in `enabled`, in catalog order.
    pub fn run_all(&mut self, catalog: &[Task], enabled: &[TaskId], log: &mut RunLogger) -> Vec<TaskResult> {
        catalog
            .iter()
            .filter(|task| enabled.contains(&task.id))
            .map(|task| self.run_one(task, log))
            .collect()
    }

    /// Run one task. Failures are logged as a single ERROR and never propagate.
    pub fn run_one(&mut self, task: &Task, log: &mut RunLogger) -> TaskResult {
        let id = task.id;
        log.info(format!("==> {} [{}]", id.description(), id));

        let mut ctx = TaskContext {
            settings: self.settings,
            dry_run: self.dry_run,
            log,
            platform: &mut *self.platform,
            gate: &mut *self.gate,
        };

        if let Some(check) = task.precondition {
            if let Err(e) = check(&mut ctx) {
                ctx.log.error(format!("{id}: {e}; task not attempted"));
                return TaskResult {
                    name: id,
                    attempted: false,
                    succeeded: false,
                    exit_code: e.exit_code(),
                };
            }
        }

        match (task.run)(&mut ctx) {
            Ok(TaskOutcome::Completed) => {
                ctx.log.success(format!("{} completed", id.description()));
                TaskResult {
                    name: id,
                    attempted: true,
                    succeeded: true,
                    exit_code: Some(0),
                }
            }
            Ok(TaskOutcome::Skipped(reason)) => {
                ctx.log.info(format!("{id} skipped: {reason}"));
                TaskResult {
                    name: id,
                    attempted: true,
                    succeeded: true,
                    exit_code: None,
                }
            }
            Err(e) => {
                ctx.log.error(format!("{id} failed: {e}"));
                TaskResult {
                    name: id,
                    attempted: true,
                    succeeded: false,
                    exit_code: e.exit_code(),
                }
            }
        }
    }
}

/// Machine-readable end-of-run record (`--json`).
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub elapsed_secs: u64,
    pub dry_run: bool,
    pub check_only: bool,
    pub errors: usize,
    pub warnings: usize,
    pub log_file: String,
    pub tasks: Vec<TaskResult>,
}

impl RunSummary {
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.errors == 0 { 0 } else { 1 }
    }
}
