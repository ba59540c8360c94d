//! Scripted [`Platform`] that records every invocation and answers from a table.
//!
//! Used by the unit and integration test suites to drive tasks without touching
//! the host. Responses are matched by command-line prefix; the first matching
//! rule wins and may be reused.

#![allow(missing_docs)]

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::core::errors::{FedorableError, Result};
use crate::platform::pal::{CommandOutput, CommandSpec, FsStats, Platform};

#[derive(Debug, Clone)]
struct Rule {
    prefix: String,
    outputs: VecDeque<CommandOutput>,
    fallback: CommandOutput,
}

#[derive(Debug, Clone)]
pub struct ScriptedPlatform {
    rules: Vec<Rule>,
    calls: Vec<CommandSpec>,
    missing_programs: HashSet<String>,
    existing_paths: HashSet<PathBuf>,
    unlaunchable: HashSet<String>,
    stats: FsStats,
}

impl Default for ScriptedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPlatform {
    /// Every program exists, every command succeeds with empty output, and `/` has
    /// 100 GiB of which 60 GiB are available.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Vec::new(),
            missing_programs: HashSet::new(),
            existing_paths: HashSet::new(),
            unlaunchable: HashSet::new(),
            stats: FsStats {
                total_bytes: 100 * 1024 * 1024 * 1024,
                available_bytes: 60 * 1024 * 1024 * 1024,
            },
        }
    }

    /// Answer commands whose display form starts with `prefix`.
    #[must_use]
    pub fn respond(mut self, prefix: &str, output: CommandOutput) -> Self {
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            outputs: VecDeque::new(),
            fallback: output,
        });
        self
    }

    /// Answer successive matching invocations with `outputs`, then repeat the last.
    #[must_use]
    pub fn respond_sequence(mut self, prefix: &str, outputs: Vec<CommandOutput>) -> Self {
        let fallback = outputs.last().cloned().unwrap_or_default();
        self.rules.push(Rule {
            prefix: prefix.to_string(),
            outputs: outputs.into(),
            fallback,
        });
        self
    }

    #[must_use]
    pub fn without_program(mut self, program: &str) -> Self {
        self.missing_programs.insert(program.to_string());
        self
    }

    /// Launching `program` fails as if the binary vanished after lookup.
    #[must_use]
    pub fn unlaunchable(mut self, program: &str) -> Self {
        self.unlaunchable.insert(program.to_string());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.add_path(path);
        self
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) {
        self.existing_paths.insert(path.into());
    }

    #[must_use]
    pub const fn with_fs_stats(mut self, stats: FsStats) -> Self {
        self.stats = stats;
        self
    }

    #[must_use]
    pub fn calls(&self) -> &[CommandSpec] {
        &self.calls
    }

    /// Display strings of every recorded command, in order.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.iter().map(CommandSpec::display).collect()
    }

    /// Commands that were not flagged read-only.
    #[must_use]
    pub fn mutating_calls(&self) -> Vec<&CommandSpec> {
        self.calls.iter().filter(|c| !c.read_only).collect()
    }

    /// Position of the first recorded command starting with `prefix`.
    #[must_use]
    pub fn position_of(&self, prefix: &str) -> Option<usize> {
        self.calls.iter().position(|c| c.display().starts_with(prefix))
    }

    #[must_use]
    pub fn count_of(&self, prefix: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| c.display().starts_with(prefix))
            .count()
    }
}

impl Platform for ScriptedPlatform {
    fn run(&mut self, command: &CommandSpec) -> Result<CommandOutput> {
        self.calls.push(command.clone());
        if self.unlaunchable.contains(&command.program) {
            return Err(FedorableError::Spawn {
                program: command.program.clone(),
                details: "No such file or directory (os error 2)".to_string(),
            });
        }
        let line = command.display();
        let output = self
            .rules
            .iter_mut()
            .find(|rule| line.starts_with(&rule.prefix))
            .map_or_else(CommandOutput::default, |rule| {
                rule.outputs
                    .pop_front()
                    .unwrap_or_else(|| rule.fallback.clone())
            });
        Ok(output)
    }

    fn has_program(&self, program: &str) -> bool {
        !self.missing_programs.contains(program)
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.existing_paths.contains(path)
    }

    fn fs_stats(&self, _path: &Path) -> Result<FsStats> {
        Ok(self.stats)
    }
}
