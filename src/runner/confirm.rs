//! Interactive yes/no confirmation, bypassed by `--yes` and `--dry-run`.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::logger::RunLogger;

/// Source of answers. `Ok(None)` means end of input.
pub trait Prompter {
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Reads answers from the controlling terminal's stdin.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt} [y/N]: ")?;
        stdout.flush()?;
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        Ok((read > 0).then_some(line))
    }
}

/// Replays canned answers; runs out as EOF.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
}

impl ScriptedPrompter {
    #[must_use]
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        Ok(self.answers.pop_front())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    Unrecognized,
}

fn parse_answer(raw: &str) -> Answer {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Answer::Yes,
        "" | "n" | "no" => Answer::No,
        _ => Answer::Unrecognized,
    }
}

/// Gate consulted by destructive tasks before they act.
pub struct ConfirmationGate {
    force_yes: bool,
    dry_run: bool,
    prompter: Box<dyn Prompter>,
    requests: usize,
}

impl ConfirmationGate {
    #[must_use]
    pub fn new(force_yes: bool, dry_run: bool, prompter: Box<dyn Prompter>) -> Self {
        Self {
            force_yes,
            dry_run,
            prompter,
            requests: 0,
        }
    }

    /// Number of confirmations requested so far, bypassed ones included.
    #[must_use]
    pub const fn requests(&self) -> usize {
        self.requests
    }

    /// Ask `prompt`; `true` means proceed.
    ///
    /// Unrecognized answers re-prompt. End of input or a read error counts as "no".
    pub fn confirm(&mut self, prompt: &str, log: &mut RunLogger) -> bool {
        self.requests += 1;
        if self.force_yes || self.dry_run {
            let why = if self.dry_run { "dry-run" } else { "--yes" };
            log.info(format!("Confirmation bypassed ({why}): {prompt}"));
            return true;
        }

        loop {
            match self.prompter.ask(prompt) {
                Ok(Some(raw)) => match parse_answer(&raw) {
                    Answer::Yes => {
                        log.info(format!("Confirmed: {prompt}"));
                        return true;
                    }
                    Answer::No => return false,
                    Answer::Unrecognized => {
                        if !log.is_quiet() {
                            println!("Please answer y or n.");
                        }
                    }
                },
                Ok(None) => {
                    log.warn(format!("No answer (end of input); treating as no: {prompt}"));
                    return false;
                }
                Err(e) => {
                    log.warn(format!("Cannot read confirmation ({e}); treating as no: {prompt}"));
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn logger(tmp: &TempDir) -> RunLogger {
        RunLogger::open(&tmp.path().join("confirm.log"), true).unwrap()
    }

    fn gate(answers: &[&str]) -> ConfirmationGate {
        ConfirmationGate::new(
            false,
            false,
            Box::new(ScriptedPrompter::new(answers.iter().copied())),
        )
    }

    #[test]
    fn answers_are_case_insensitive() {
        assert_eq!(parse_answer("Y\n"), Answer::Yes);
        assert_eq!(parse_answer(" YES "), Answer::Yes);
        assert_eq!(parse_answer("No"), Answer::No);
        assert_eq!(parse_answer("\n"), Answer::No);
        assert_eq!(parse_answer("maybe"), Answer::Unrecognized);
    }

    #[test]
    fn yes_and_no() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(&tmp);
        assert!(gate(&["y\n"]).confirm("Remove?", &mut log));
        assert!(!gate(&["n\n"]).confirm("Remove?", &mut log));
        assert!(!gate(&["\n"]).confirm("Remove?", &mut log), "empty defaults to no");
    }

    #[test]
    fn unrecognized_answers_reprompt() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(&tmp);
        let mut gate = gate(&["perhaps", "sure", "yes"]);
        assert!(gate.confirm("Remove?", &mut log));
        assert_eq!(gate.requests(), 1);
    }

    #[test]
    fn end_of_input_fails_closed() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(&tmp);
        assert!(!gate(&["what"]).confirm("Remove?", &mut log));
        assert_eq!(log.warning_count(), 1);
        assert_eq!(log.error_count(), 0);
    }

    #[test]
    fn force_yes_and_dry_run_bypass_the_prompter() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(&tmp);
        let mut forced = ConfirmationGate::new(true, false, Box::new(ScriptedPrompter::default()));
        assert!(forced.confirm("Remove?", &mut log));
        let mut dry = ConfirmationGate::new(false, true, Box::new(ScriptedPrompter::default()));
        assert!(dry.confirm("Remove?", &mut log));
        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("Confirmation bypassed (--yes)"));
        assert!(text.contains("Confirmation bypassed (dry-run)"));
    }
}
