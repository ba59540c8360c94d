//! Run configuration: built-in defaults, the TOML config file, and tunable settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{FedorableError, Result};
use crate::core::task_id::TaskId;

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fedorable.conf";

/// Default mail recipient for `--email-report`.
pub const DEFAULT_EMAIL_RECIPIENT: &str = "root@localhost";

/// Default mail subject for `--email-report`.
pub const DEFAULT_EMAIL_SUBJECT: &str = "Fedorable maintenance report";

// ---------------------------------------------------------------------------
// Task flags
// ---------------------------------------------------------------------------

/// One enable/disable boolean per task. Always complete: every [`TaskId`] has an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFlags {
    enabled: BTreeMap<TaskId, bool>,
}

impl Default for TaskFlags {
    fn default() -> Self {
        Self {
            enabled: TaskId::ALL
                .into_iter()
                .map(|id| (id, id.is_standard()))
                .collect(),
        }
    }
}

impl TaskFlags {
    #[must_use]
    pub fn is_enabled(&self, id: TaskId) -> bool {
        self.enabled.get(&id).copied().unwrap_or(false)
    }

    pub fn set(&mut self, id: TaskId, enabled: bool) {
        self.enabled.insert(id, enabled);
    }

    /// Set every standard-set task; optional tasks are left untouched.
    pub fn set_standard(&mut self, enabled: bool) {
        for id in TaskId::ALL.into_iter().filter(|id| id.is_standard()) {
            self.set(id, enabled);
        }
    }

    /// Enabled tasks in execution order.
    #[must_use]
    pub fn enabled_tasks(&self) -> Vec<TaskId> {
        TaskId::ALL
            .into_iter()
            .filter(|id| self.is_enabled(*id))
            .collect()
    }

    /// Apply partial overrides field by field.
    pub fn overlay(&mut self, overrides: &BTreeMap<TaskId, bool>) {
        for (id, enabled) in overrides {
            self.set(*id, *enabled);
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Tunable paths and retention thresholds. Every key is optional in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory holding one log file per run.
    pub log_dir: PathBuf,
    /// Host-wide single-instance lock.
    pub lock_file: PathBuf,
    /// Root for configuration backups.
    pub backup_dir: PathBuf,
    /// Files and directories copied by the backup task.
    pub backup_paths: Vec<PathBuf>,
    /// Parent of user home directories.
    pub home_root: PathBuf,
    /// Home directory of root.
    pub root_home: PathBuf,
    /// systemd-coredump storage.
    pub coredump_dir: PathBuf,
    /// Directories swept for stale temp files.
    pub temp_dirs: Vec<PathBuf>,
    /// Temp files not accessed for this many days are deleted.
    pub temp_max_age_days: u32,
    /// Number of most recent kernels to keep.
    pub kernel_retention: u32,
    /// Maximum number of tagged snapshots after a run.
    pub snapshot_retention: u32,
    /// Marker placed in the comment of snapshots this tool creates.
    pub snapshot_tag: String,
    /// `journalctl --vacuum-time` argument.
    pub journal_vacuum_time: String,
    /// `journalctl --vacuum-size` argument.
    pub journal_vacuum_size: String,
    /// Free space on `/` required before a package upgrade.
    pub min_free_space_mb: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/var/log/fedorable"),
            lock_file: PathBuf::from("/run/fedorable.lock"),
            backup_dir: PathBuf::from("/root/fedorable_backups"),
            backup_paths: [
                "/etc/dnf",
                "/etc/fstab",
                "/etc/default/grub",
                "/etc/hostname",
                "/etc/hosts",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
            home_root: PathBuf::from("/home"),
            root_home: PathBuf::from("/root"),
            coredump_dir: PathBuf::from("/var/lib/systemd/coredump"),
            temp_dirs: vec![PathBuf::from("/tmp"), PathBuf::from("/var/tmp")],
            temp_max_age_days: 10,
            kernel_retention: 2,
            snapshot_retention: 5,
            snapshot_tag: "fedorable".to_string(),
            journal_vacuum_time: "2weeks".to_string(),
            journal_vacuum_size: "500M".to_string(),
            min_free_space_mb: 1024,
        }
    }
}

impl Settings {
    /// Reject values that would make a task behave destructively or nonsensically.
    pub fn validate(&self) -> Result<()> {
        if self.kernel_retention == 0 {
            return Err(FedorableError::InvalidConfig {
                details: "settings.kernel_retention must be at least 1".to_string(),
            });
        }
        if self.snapshot_retention == 0 {
            return Err(FedorableError::InvalidConfig {
                details: "settings.snapshot_retention must be at least 1".to_string(),
            });
        }
        if self.snapshot_tag.trim().is_empty() {
            return Err(FedorableError::InvalidConfig {
                details: "settings.snapshot_tag must not be empty".to_string(),
            });
        }
        for dir in &self.temp_dirs {
            if !dir.is_absolute() || dir == Path::new("/") {
                return Err(FedorableError::InvalidConfig {
                    details: format!(
                        "settings.temp_dirs entry {} must be an absolute, non-root path",
                        dir.display()
                    ),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config file
// ---------------------------------------------------------------------------

/// Global option overrides from the `[options]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionOverrides {
    pub force_yes: Option<bool>,
    pub dry_run: Option<bool>,
    pub quiet: Option<bool>,
    pub check_only: Option<bool>,
    pub email_report: Option<bool>,
    pub email_recipient: Option<String>,
    pub email_subject: Option<String>,
}

/// On-disk shape; task keys are resolved to [`TaskId`] after parsing.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfigFile {
    tasks: BTreeMap<String, bool>,
    options: OptionOverrides,
    settings: Settings,
}

/// Parsed contents of the user-editable config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub tasks: BTreeMap<TaskId, bool>,
    pub options: OptionOverrides,
    pub settings: Settings,
}

impl ConfigFile {
    /// Parse config file contents.
    ///
    /// Task keys may be written `clean_kernels` or `clean-kernels`.
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: RawConfigFile = toml::from_str(raw)?;
        parsed.settings.validate()?;

        let mut tasks = BTreeMap::new();
        for (key, enabled) in parsed.tasks {
            let id = TaskId::from_flag_name(&key.replace('_', "-")).ok_or_else(|| {
                FedorableError::ConfigParse {
                    context: "tasks",
                    details: format!("unknown task `{key}`"),
                }
            })?;
            tasks.insert(id, enabled);
        }

        Ok(Self {
            tasks,
            options: parsed.options,
            settings: parsed.settings,
        })
    }

    /// Load the config file at `path`.
    ///
    /// A missing file is only an error when `explicit` is set (the user named it).
    pub fn load(path: &Path, explicit: bool) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    Err(FedorableError::MissingConfig {
                        path: path.to_path_buf(),
                    })
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(FedorableError::io(path, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Everything a run needs to know. Built once at startup; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfiguration {
    pub tasks: TaskFlags,
    pub dry_run: bool,
    pub force_yes: bool,
    pub quiet: bool,
    pub check_only: bool,
    pub email_report: bool,
    pub email_recipient: String,
    pub email_subject: String,
    pub config_path: PathBuf,
    pub json: bool,
    pub no_color: bool,
    pub settings: Settings,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            tasks: TaskFlags::default(),
            dry_run: false,
            force_yes: false,
            quiet: false,
            check_only: false,
            email_report: false,
            email_recipient: DEFAULT_EMAIL_RECIPIENT.to_string(),
            email_subject: DEFAULT_EMAIL_SUBJECT.to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            json: false,
            no_color: false,
            settings: Settings::default(),
        }
    }
}

impl RunConfiguration {
    /// Overlay a parsed config file onto the current values.
    pub fn apply_config_file(&mut self, file: &ConfigFile) {
        self.tasks.overlay(&file.tasks);
        let opts = &file.options;
        if let Some(v) = opts.force_yes {
            self.force_yes = v;
        }
        if let Some(v) = opts.dry_run {
            self.dry_run = v;
        }
        if let Some(v) = opts.quiet {
            self.quiet = v;
        }
        if let Some(v) = opts.check_only {
            self.check_only = v;
        }
        if let Some(v) = opts.email_report {
            self.email_report = v;
        }
        if let Some(v) = &opts.email_recipient {
            self.email_recipient.clone_from(v);
        }
        if let Some(v) = &opts.email_subject {
            self.email_subject.clone_from(v);
        }
        self.settings = file.settings.clone();
    }

    /// Whether some enabled task would ask for interactive confirmation.
    #[must_use]
    pub fn needs_interaction(&self) -> bool {
        !self.force_yes
            && !self.dry_run
            && !self.check_only
            && self
                .tasks
                .enabled_tasks()
                .iter()
                .any(|id| id.needs_confirmation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_enable_the_standard_set_only() {
        let flags = TaskFlags::default();
        for id in TaskId::ALL {
            assert_eq!(flags.is_enabled(id), id.is_standard(), "{id}");
        }
        assert_eq!(flags.enabled_tasks().len(), 18);
    }

    #[test]
    fn set_standard_leaves_optional_tasks_alone() {
        let mut flags = TaskFlags::default();
        flags.set(TaskId::Backup, true);
        flags.set_standard(false);
        assert_eq!(flags.enabled_tasks(), vec![TaskId::Backup]);
    }

    #[test]
    fn config_file_parses_all_tables() {
        let raw = r#"
            [tasks]
            clean_kernels = false
            backup = true

            [options]
            email_report = true
            email_recipient = "ops@example.com"

            [settings]
            kernel_retention = 3
            log_dir = "/tmp/fedorable-logs"
        "#;
        let file = ConfigFile::parse(raw).unwrap();
        assert_eq!(file.tasks.get(&TaskId::CleanKernels), Some(&false));
        assert_eq!(file.options.email_report, Some(true));
        assert_eq!(file.settings.kernel_retention, 3);
        // Untouched settings keep their defaults.
        assert_eq!(file.settings.snapshot_retention, 5);
        assert_eq!(file.settings.journal_vacuum_size, "500M");
    }

    #[test]
    fn config_file_rejects_unknown_keys() {
        let err = ConfigFile::parse("[tasks]\ndefrag = true\n").unwrap_err();
        assert!(err.to_string().contains("unknown task `defrag`"));
        assert!(ConfigFile::parse("[options]\nverbose = true\n").is_err());
        assert!(ConfigFile::parse("[colors]\n").is_err());
    }

    #[test]
    fn task_keys_accept_kebab_case() {
        let file = ConfigFile::parse("[tasks]\n\"clean-journal\" = false\n").unwrap();
        assert_eq!(file.tasks.get(&TaskId::CleanJournal), Some(&false));
    }

    #[test]
    fn config_file_rejects_zero_retention() {
        let err = ConfigFile::parse("[settings]\nkernel_retention = 0\n").unwrap_err();
        assert_eq!(err.code(), "FDR-1001");
    }

    #[test]
    fn config_overlay_overrides_field_by_field() {
        let file = ConfigFile::parse(
            "[tasks]\ntrim = false\ntimeshift = true\n[options]\nquiet = true\n",
        )
        .unwrap();
        let mut config = RunConfiguration::default();
        config.apply_config_file(&file);
        assert!(!config.tasks.is_enabled(TaskId::Trim));
        assert!(config.tasks.is_enabled(TaskId::Timeshift));
        assert!(config.tasks.is_enabled(TaskId::Update));
        assert!(config.quiet);
        assert!(!config.dry_run);
        assert_eq!(config.email_recipient, DEFAULT_EMAIL_RECIPIENT);
    }

    #[test]
    fn missing_default_config_is_ignored_but_explicit_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.conf");
        assert!(ConfigFile::load(&path, false).unwrap().is_none());
        let err = ConfigFile::load(&path, true).unwrap_err();
        assert_eq!(err.code(), "FDR-1002");
    }

    #[test]
    fn load_reads_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fedorable.conf");
        std::fs::write(&path, "[tasks]\nupdate = false\n").unwrap();
        let file = ConfigFile::load(&path, false).unwrap().unwrap();
        assert_eq!(file.tasks.get(&TaskId::Update), Some(&false));
    }

    #[test]
    fn needs_interaction_tracks_confirming_tasks() {
        let mut config = RunConfiguration::default();
        assert!(config.needs_interaction());
        config.force_yes = true;
        assert!(!config.needs_interaction());

        let mut quiet_tasks = RunConfiguration::default();
        quiet_tasks.tasks.set_standard(false);
        quiet_tasks.tasks.set(TaskId::Trim, true);
        assert!(!quiet_tasks.needs_interaction());
    }
}
