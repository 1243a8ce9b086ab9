//! Yes/no confirmation prompts
//!
//! Destructive commands and the long-session warning ask before going
//! ahead. The [`Prompter`] trait lets tests script the answers.

use crate::error::Result;
use std::io::{BufRead, Write};

/// Something that can answer a yes/no question
pub trait Prompter {
    /// Ask `question` and return true only for an explicit yes
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Interpret a typed answer; anything but `y`/`yes` is a no
pub fn parse_answer(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Prompts on stderr and reads the answer from stdin
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{} [y/N]: ", question)?;
        stderr.flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(parse_answer(&input))
    }
}

/// Answers every question with yes (`--yes` flags)
#[derive(Debug, Default)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        tracing::debug!("Auto-confirming: {}", question);
        Ok(true)
    }
}
