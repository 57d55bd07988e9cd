//! Yes/no questions for the apply gate.
//!
//! The [`Prompter`] trait keeps approval logic independent of the terminal.
//! Tests use scripted prompters that replay canned answers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Source of answers to approval questions.
pub trait Prompter {
    /// Show `question` and return the raw answer line.
    fn ask(&self, question: &str) -> Result<String>;
}

impl<P: Prompter + ?Sized> Prompter for &P {
    fn ask(&self, question: &str) -> Result<String> {
        (**self).ask(question)
    }
}

/// Prompter reading from stdin and writing questions to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioPrompter;

impl Prompter for StdioPrompter {
    fn ask(&self, question: &str) -> Result<String> {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(question.as_bytes())
            .context("write prompt")?;
        stdout.flush().context("flush prompt")?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read answer")?;
        Ok(line)
    }
}

/// True for `y` / `yes`, ignoring case and surrounding whitespace.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
