//! Option precedence: built-in defaults < config file < command line.
//!
//! The CLI layer turns argv into a [`CliOverrides`] value (toggles kept in argument
//! order); [`resolve`] folds the three sources into a [`RunConfiguration`].

use std::path::{Path, PathBuf};

use crate::core::config::{ConfigFile, DEFAULT_CONFIG_PATH, RunConfiguration};
use crate::core::errors::Result;
use crate::core::task_id::TaskId;

/// One task-selection flag as it appeared on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// `--all`: enable the standard set.
    All,
    /// `--none`: disable the standard set.
    None,
    /// `--perform-<task>`.
    Enable(TaskId),
    /// `--no-<task>`.
    Disable(TaskId),
}

/// Values given on the command line. `None`/`false` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// Task toggles in command-line order.
    pub toggles: Vec<Toggle>,
    pub force_yes: bool,
    pub dry_run: bool,
    pub quiet: bool,
    pub check_only: bool,
    pub email_report: bool,
    pub email_recipient: Option<String>,
    pub email_subject: Option<String>,
    pub config_path: Option<PathBuf>,
    pub json: bool,
    pub no_color: bool,
}

impl CliOverrides {
    /// Config file to read and whether the user named it explicitly.
    #[must_use]
    pub fn config_source(&self) -> (PathBuf, bool) {
        self.config_path.as_ref().map_or_else(
            || (PathBuf::from(DEFAULT_CONFIG_PATH), false),
            |p| (p.clone(), true),
        )
    }
}

/// Fold defaults, an optional config file, and CLI flags into a run configuration.
#[must_use]
pub fn resolve(file: Option<&ConfigFile>, cli: &CliOverrides, config_path: &Path) -> RunConfiguration {
    let mut config = RunConfiguration::default();
    if let Some(file) = file {
        config.apply_config_file(file);
    }
    config.config_path = config_path.to_path_buf();

    for toggle in &cli.toggles {
        match *toggle {
            Toggle::All => config.tasks.set_standard(true),
            Toggle::None => config.tasks.set_standard(false),
            Toggle::Enable(id) => config.tasks.set(id, true),
            Toggle::Disable(id) => config.tasks.set(id, false),
        }
    }

    // Boolean switches can only turn a mode on from the command line.
    config.force_yes |= cli.force_yes;
    config.dry_run |= cli.dry_run;
    config.quiet |= cli.quiet;
    config.check_only |= cli.check_only;
    config.email_report |= cli.email_report;
    config.json = cli.json;
    config.no_color = cli.no_color;
    if let Some(recipient) = &cli.email_recipient {
        config.email_recipient.clone_from(recipient);
    }
    if let Some(subject) = &cli.email_subject {
        config.email_subject.clone_from(subject);
    }
    config
}

/// Load the config file named by (or defaulted from) `cli` and resolve.
pub fn load_and_resolve(cli: &CliOverrides) -> Result<RunConfiguration> {
    let (path, explicit) = cli.config_source();
    let file = ConfigFile::load(&path, explicit)?;
    Ok(resolve(file.as_ref(), cli, &path))
}
