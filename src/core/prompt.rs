//! Yes/no confirmation capability.
//!
//! Every blocking question goes through [`Confirm`] so unattended runs can
//! inject an implementation that never touches stdin.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Ask the user a yes/no question.
pub trait Confirm {
    /// Returns `true` only on an explicit affirmative answer.
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// `y` / `yes`, case-insensitive, surrounding whitespace ignored.
#[must_use]
pub fn is_affirmative(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Prompts on stderr (stdout stays clean for JSON reports) and reads one
/// line from stdin.
///
/// EOF or a read error counts as a decline.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "{prompt} [y/N] ");
        let _ = stderr.flush();
        drop(stderr);

        let mut input = String::new();
        match io::stdin().lock().read_line(&mut input) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&input),
        }
    }
}

/// Always answers yes. Used for unattended applies and `--yes`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoAccept;

impl Confirm for AutoAccept {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}

/// Always answers no. Used where unattended runs must take the safe default.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoDecline;

impl Confirm for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> bool {
        false
    }
}

/// Replays canned answers and records every prompt it was shown.
///
/// Runs out of answers → declines.
#[derive(Debug, Default, Clone)]
pub struct ScriptedConfirm {
    answers: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedConfirm {
    #[must_use]
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts shown so far, in order.
    #[must_use]
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .is_some_and(|answer| is_affirmative(&answer))
    }
}
