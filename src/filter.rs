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

//! The set of paths to back up, shaped by an optional filter file.
//!
//! A filter file holds one rule per line: a sign (`-` to exclude, `+` to
//! include, `#` for a comment) followed by a glob pattern. Patterns may be
//! absolute (within the user folder) or relative to it, and only ever match
//! files. Rules apply in order; a rule only fires when it would change the
//! current decision for the file.

use std::{
    collections::HashSet,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use globset::{GlobBuilder, GlobMatcher};

use crate::{cli::Cli, errors::CommandLineError, ui::cli, utils};

struct FilterRule {
    line_number: usize,
    sign: char,
    pattern_text: String,
    matcher: GlobMatcher,
}

/// Generates the list of all paths to be backed up after filtering.
pub struct BackupSet {
    user_folder: PathBuf,
    filter_file: Option<PathBuf>,
    rules: Vec<FilterRule>,
    lines_used: HashSet<usize>,
}

impl BackupSet {
    /// Prepare the path generator by parsing the filter file.
    pub fn new(user_folder: &Path, filter_file: Option<&Path>) -> Result<Self> {
        let user_folder = utils::absolute_path(user_folder);
        let mut rules = Vec::new();

        if let Some(filter_file) = filter_file {
            let contents = std::fs::read_to_string(filter_file).with_context(|| {
                format!("Could not read filter file '{}'", filter_file.display())
            })?;
            for (line_index, line_raw) in contents.lines().enumerate() {
                let line_number = line_index + 1;
                let line = line_raw.trim();
                if line.is_empty() {
                    continue;
                }

                let sign = line.chars().next().unwrap_or_default();
                if !['-', '+', '#'].contains(&sign) {
                    bail!(CommandLineError(format!(
                        "Line #{line_number} ({line}): The first symbol of each line in the \
                         filter file must be -, +, or #."
                    )));
                }
                if sign == '#' {
                    continue;
                }

                let pattern = user_folder.join(line[1..].trim());
                if !pattern.starts_with(&user_folder) {
                    bail!(CommandLineError(format!(
                        "Line #{line_number} ({line}): Filter looks at paths outside user folder."
                    )));
                }

                let glob = GlobBuilder::new(&pattern.to_string_lossy())
                    .literal_separator(true)
                    .build()
                    .map_err(|error| {
                        CommandLineError(format!("Line #{line_number} ({line}): {error}"))
                    })?;
                cli::debug!("Filter added: {line} --> {sign} {}", pattern.display());
                rules.push(FilterRule {
                    line_number,
                    sign,
                    pattern_text: pattern.display().to_string(),
                    matcher: glob.compile_matcher(),
                });
            }
        }

        Ok(Self {
            user_folder,
            filter_file: filter_file.map(Path::to_path_buf),
            rules,
            lines_used: HashSet::new(),
        })
    }

    pub fn user_folder(&self) -> &Path {
        &self.user_folder
    }

    /// Determine if a path should be included in the backup.
    fn passes(&mut self, path: &Path) -> bool {
        let mut is_included = !utils::is_junction(path);
        for rule in &self.rules {
            let should_include = rule.sign == '+';
            if is_included == should_include || !rule.matcher.is_match(path) {
                continue;
            }

            self.lines_used.insert(rule.line_number);
            is_included = should_include;
            cli::debug!(
                "File: {} {} by line {}: {} {}",
                path.display(),
                if is_included { "included" } else { "excluded" },
                rule.line_number,
                rule.sign,
                rule.pattern_text
            );
        }
        is_included
    }

    /// Walk the user folder, yielding each directory together with the names
    /// of its surviving files. Directories with no surviving files are
    /// skipped.
    pub fn scan(&mut self) -> Scanner<'_> {
        let root = self.user_folder.clone();
        Scanner {
            set: self,
            stack: vec![root],
        }
    }

    /// Warn if any of the lines in the filter file had no effect. Call after
    /// the scan is exhausted.
    pub fn report_unused_lines(&self) {
        let Some(filter_file) = &self.filter_file else {
            return;
        };
        for rule in &self.rules {
            if !self.lines_used.contains(&rule.line_number) {
                cli::log!(
                    "{}: line #{} ({} {}) had no effect.",
                    filter_file.display(),
                    rule.line_number,
                    rule.sign,
                    rule.pattern_text
                );
            }
        }
    }
}

/// Depth-first traversal of the filtered user folder.
pub struct Scanner<'a> {
    set: &'a mut BackupSet,
    stack: Vec<PathBuf>,
}

impl Iterator for Scanner<'_> {
    type Item = (PathBuf, Vec<String>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(directory) = self.stack.pop() {
            let entries = match std::fs::read_dir(&directory) {
                Ok(entries) => entries,
                Err(error) => {
                    cli::warning!("Could not read directory {}: {error}", directory.display());
                    continue;
                }
            };

            let mut subdirectories = Vec::new();
            let mut file_names = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if utils::is_real_directory(&path) {
                    subdirectories.push(path);
                } else if self.set.passes(&path) {
                    file_names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }

            subdirectories.sort();
            for subdirectory in subdirectories.into_iter().rev() {
                self.stack.push(subdirectory);
            }

            if !file_names.is_empty() {
                file_names.sort();
                return Some((directory, file_names));
            }
        }
        None
    }
}

/// Print a list of the files that will make it through the filter file.
pub fn preview_filter(args: &Cli) -> Result<()> {
    let user_folder = utils::get_existing_path(args.user_folder.as_deref(), "user folder")?;
    let filter_file = args.filter.as_ref().map(|f| utils::absolute_path(Path::new(f)));
    let mut backup_set = BackupSet::new(&user_folder, filter_file.as_deref())?;

    let output_file = args
        .preview_filter
        .as_deref()
        .filter(|file_name| !file_name.is_empty())
        .map(|file_name| utils::absolute_path(Path::new(file_name)));
    let mut output: Box<dyn Write> = match &output_file {
        Some(path) => Box::new(std::fs::File::create(path).with_context(|| {
            format!("Could not create preview file '{}'", path.display())
        })?),
        None => Box::new(std::io::stdout()),
    };

    for (directory, file_names) in backup_set.scan() {
        utils::write_directory(&mut output, &directory, &file_names)?;
    }
    backup_set.report_unused_lines();
    Ok(())
}
