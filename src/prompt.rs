//! Operator prompts
//!
//! Everything that waits on a human goes through [`Prompter`] so menu and
//! swap-size flows can be driven by scripted answers in tests.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input};

pub trait Prompter {
    /// Read a line of free text
    fn input(&mut self, prompt: &str) -> Result<String>;

    /// Ask a yes/no question
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Interactive prompts on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str) -> Result<String> {
        let answer: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        Ok(answer)
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        Ok(confirmed)
    }
}

#[cfg(test)]
pub(crate) use scripted::ScriptedPrompter;

#[cfg(test)]
mod scripted {
    use super::Prompter;
    use anyhow::{Result, bail};
    use std::collections::VecDeque;

    /// Answers prompts from a fixed script; running out is an error
    #[derive(Debug, Default)]
    pub struct ScriptedPrompter {
        answers: VecDeque<String>,
        pub prompts: Vec<String>,
    }

    impl ScriptedPrompter {
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

        fn next(&mut self, prompt: &str) -> Result<String> {
            self.prompts.push(prompt.to_string());
            match self.answers.pop_front() {
                Some(answer) => Ok(answer),
                None => bail!("No scripted answer for '{}'", prompt),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn input(&mut self, prompt: &str) -> Result<String> {
            self.next(prompt)
        }

        fn confirm(&mut self, prompt: &str) -> Result<bool> {
            let answer = self.next(prompt)?;
            Ok(matches!(answer.as_str(), "y" | "yes"))
        }
    }
}
