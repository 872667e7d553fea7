// vintagebackup is an incremental backup tool based on hard-linked snapshots
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::collections::VecDeque;

use anyhow::{Result, bail};
use dialoguer::{Input, Select, theme::ColorfulTheme};

use crate::errors::CommandLineError;

/// A source of interactive answers.
///
/// Operations that need a decision mid-run take a `Prompter` so that scripted
/// runs and tests can supply canned responses instead of reading a terminal.
pub trait Prompter {
    /// Choose an entry from a list. Returns an index into `items`.
    fn choose(&mut self, items: &[String], prompt: &str) -> Result<usize>;

    /// Ask a free-form question and return the response line.
    fn line(&mut self, prompt: &str) -> Result<String>;
}

/// Interactive prompts on the controlling terminal.
pub struct Console;

impl Prompter for Console {
    fn choose(&mut self, items: &[String], prompt: &str) -> Result<usize> {
        let index = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact()?;
        Ok(index)
    }

    fn line(&mut self, prompt: &str) -> Result<String> {
        let response = Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(response)
    }
}

/// Canned responses consumed in order. Menu responses are 1-based, matching
/// what a user would type at a numbered menu.
pub struct Scripted {
    responses: VecDeque<String>,
}

impl Scripted {
    pub fn new(responses: &[String]) -> Self {
        Self {
            responses: responses.iter().cloned().collect(),
        }
    }

    fn next_response(&mut self, prompt: &str) -> Result<String> {
        match self.responses.pop_front() {
            Some(response) => Ok(response),
            None => bail!(CommandLineError(format!(
                "No scripted response left for: {prompt}"
            ))),
        }
    }
}

impl Prompter for Scripted {
    fn choose(&mut self, items: &[String], prompt: &str) -> Result<usize> {
        let response = self.next_response(prompt)?;
        let number: usize = response.trim().parse().map_err(|_| {
            CommandLineError(format!("Invalid scripted menu choice: {response}"))
        })?;
        if number < 1 || number > items.len() {
            bail!(CommandLineError(format!(
                "Scripted menu choice out of range (1 to {}): {number}",
                items.len()
            )));
        }
        Ok(number - 1)
    }

    fn line(&mut self, prompt: &str) -> Result<String> {
        self.next_response(prompt)
    }
}
