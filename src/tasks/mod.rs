//! The task library: one [`Task`] per [`TaskId`], in execution order.

pub mod cleanup;
pub mod health;
pub mod optimize;
pub mod packages;
pub mod safety;

use crate::core::task_id::TaskId;
use crate::runner::task::{Task, TaskCheck, TaskRun};

/// The full catalog, in [`TaskId::ALL`] order.
#[must_use]
pub fn catalog() -> Vec<Task> {
    TaskId::ALL.into_iter().map(task).collect()
}

/// Catalog entry for `id`.
#[must_use]
pub fn task(id: TaskId) -> Task {
    let (precondition, run): (Option<TaskCheck>, TaskRun) = match id {
        TaskId::Timeshift => (None, safety::timeshift),
        TaskId::Backup => (None, safety::backup),
        TaskId::Update => (Some(packages::enough_free_space), packages::update),
        TaskId::UpdateFirmware => (None, packages::update_firmware),
        TaskId::Autoremove => (None, packages::autoremove),
        TaskId::CleanDnf => (None, packages::clean_dnf),
        TaskId::CleanKernels => (None, packages::clean_kernels),
        TaskId::CleanFlatpak => (None, packages::clean_flatpak),
        TaskId::CleanSnap => (None, packages::clean_snap),
        TaskId::CleanUserCache => (None, cleanup::clean_user_cache),
        TaskId::CleanJournal => (None, cleanup::clean_journal),
        TaskId::CleanTemp => (None, cleanup::clean_temp),
        TaskId::CleanCoredumps => (None, cleanup::clean_coredumps),
        TaskId::ClearHistory => (None, cleanup::clear_history),
        TaskId::UpdateGrub => (None, optimize::update_grub),
        TaskId::OptimizeRpmdb => (None, optimize::optimize_rpmdb),
        TaskId::ResetFailedUnits => (None, optimize::reset_failed_units),
        TaskId::UpdateFonts => (None, optimize::update_fonts),
        TaskId::Trim => (None, optimize::trim),
        TaskId::OptimizeFstrim => (None, optimize::optimize_fstrim),
        TaskId::UpdateMandb => (None, optimize::update_mandb),
        TaskId::CheckServices => (None, health::check_services),
    };
    Task { id, precondition, run }
}

#[cfg(test)]
pub(crate) mod harness {
    //! Shared fixture for task unit tests.

    use tempfile::TempDir;

    use crate::core::config::{RunConfiguration, Settings};
    use crate::core::task_id::TaskId;
    use crate::logger::RunLogger;
    use crate::platform::scripted::ScriptedPlatform;
    use crate::runner::confirm::{ConfirmationGate, ScriptedPrompter};
    use crate::runner::engine::TaskRunner;
    use crate::runner::task::TaskResult;

    pub struct Harness {
        pub tmp: TempDir,
        pub log: RunLogger,
        pub platform: ScriptedPlatform,
        pub gate: ConfirmationGate,
        pub config: RunConfiguration,
    }

    impl Harness {
        /// Non-interactive gate with no answers, settings rooted in a temp dir.
        pub fn new(platform: ScriptedPlatform) -> Self {
            Self::with_answers(platform, &[])
        }

        pub fn with_answers(platform: ScriptedPlatform, answers: &[&str]) -> Self {
            let tmp = TempDir::new().unwrap();
            let log = RunLogger::open(&tmp.path().join("task.log"), true).unwrap();
            let root = tmp.path();
            let settings = Settings {
                log_dir: root.join("log"),
                lock_file: root.join("fedorable.lock"),
                backup_dir: root.join("backups"),
                backup_paths: vec![root.join("etc/fstab"), root.join("etc/dnf")],
                home_root: root.join("home"),
                root_home: root.join("root"),
                coredump_dir: root.join("coredump"),
                temp_dirs: vec![root.join("tmp")],
                ..Settings::default()
            };
            Self {
                gate: ConfirmationGate::new(
                    false,
                    false,
                    Box::new(ScriptedPrompter::new(answers.iter().copied())),
                ),
                config: RunConfiguration {
                    settings,
                    ..RunConfiguration::default()
                },
                tmp,
                log,
                platform,
            }
        }

        pub fn dry_run(mut self) -> Self {
            self.config.dry_run = true;
            self.gate = ConfirmationGate::new(false, true, Box::new(ScriptedPrompter::default()));
            self
        }

        pub fn settings(&self) -> &Settings {
            &self.config.settings
        }

        pub fn run(&mut self, id: TaskId) -> TaskResult {
            TaskRunner::new(&self.config, &mut self.platform, &mut self.gate).run_one(&super::task(id), &mut self.log)
        }

        pub fn log_text(&self) -> String {
            std::fs::read_to_string(self.log.path()).unwrap()
        }
    }
}
