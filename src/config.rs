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

//! Reading and writing configuration files.
//!
//! A configuration file holds one option per line as `name: value`, where
//! the name is a long command line option with dashes or spaces between
//! words in any case. Blank lines and lines starting with `#` are ignored.
//! One pair of surrounding double quotes is removed from a value, so names
//! with leading or trailing spaces can be written by quoting them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::{cli::Cli, errors::CommandLineError, ui::cli, utils};

/// Parse a configuration file into a list of command line arguments.
pub fn read_configuration_file(config_file: &Path) -> Result<Vec<String>> {
    let contents = match std::fs::read_to_string(config_file) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            bail!(CommandLineError(format!(
                "Configuration file does not exist: {}",
                config_file.display()
            )));
        }
        Err(error) => {
            return Err(error).with_context(|| {
                format!("Could not read configuration file '{}'", config_file.display())
            });
        }
    };

    let mut arguments = Vec::new();
    for line_raw in contents.lines() {
        let line = line_raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((parameter_raw, value_raw)) = line.split_once(':') else {
            bail!(CommandLineError(format!(
                "Invalid line in configuration file (expected \"name: value\"): {line}"
            )));
        };

        let parameter = parameter_raw
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        if parameter == "config" {
            bail!(CommandLineError(
                "The parameter `config` within a configuration file has no effect.".to_string()
            ));
        }
        arguments.push(format!("--{parameter}"));

        let value = remove_quotes(value_raw);
        if !value.is_empty() {
            arguments.push(value);
        }
    }
    Ok(arguments)
}

/// After stripping outer whitespace, remove one pair of double quotes from
/// the start and end of a string.
pub fn remove_quotes(text: &str) -> String {
    let text = text.trim();
    if text.len() > 1 && text.starts_with('"') && text.ends_with('"') {
        text[1..text.len() - 1].to_string()
    } else {
        text.to_string()
    }
}

fn quoted_if_padded(value: &str) -> String {
    if value.trim() != value {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Generate a configuration file matching the given arguments and return the
/// path it was written to.
pub fn generate_config(args: &Cli, config_file: &Path) -> Result<PathBuf> {
    let absolute = |value: &str| utils::absolute_path(Path::new(value)).display().to_string();

    let mut entries: Vec<(&str, String)> = Vec::new();
    let mut add_value = |name: &'static str, value: &Option<String>, is_path: bool| {
        if let Some(value) = value {
            let value = if is_path { absolute(value) } else { value.clone() };
            entries.push((name, value));
        }
    };

    add_value("recover", &args.recover, false);
    add_value("list", &args.list, false);
    add_value("move backup", &args.move_backup, false);
    add_value("verify", &args.verify, false);
    add_value("purge", &args.purge, false);
    add_value("purge list", &args.purge_list, false);
    add_value("preview filter", &args.preview_filter, false);
    add_value("user folder", &args.user_folder, true);
    add_value("backup folder", &args.backup_folder, true);
    add_value("filter", &args.filter, true);
    add_value("free up", &args.free_up, false);
    add_value("delete after", &args.delete_after, false);
    add_value("max deletions", &args.max_deletions, false);
    add_value("hard link count", &args.hard_link_count, false);
    add_value("copy probability", &args.copy_probability, false);
    add_value("keep weekly after", &args.keep_weekly_after, false);
    add_value("keep monthly after", &args.keep_monthly_after, false);
    add_value("keep yearly after", &args.keep_yearly_after, false);
    add_value("move count", &args.move_count, false);
    add_value("move age", &args.move_age, false);
    add_value("move since", &args.move_since, false);
    add_value("destination", &args.destination, true);
    add_value("error log", &args.error_log, true);
    if let Some(log) = &args.log {
        let devnull = if cfg!(windows) { "NUL" } else { "/dev/null" };
        let value = if log == devnull { log.clone() } else { absolute(log) };
        entries.push(("log", value));
    }

    let flags: [(&str, bool); 10] = [
        ("whole file", args.whole_file_enabled()),
        ("delete first", args.delete_first_enabled()),
        ("force copy", args.force_copy_enabled()),
        ("debug", args.debug_enabled()),
        ("search", args.search),
        ("restore", args.restore),
        ("delete only", args.delete_only),
        ("last backup", args.last_backup),
        ("choose backup", args.choose_backup),
        ("delete extra", args.delete_extra),
    ];
    for (name, enabled) in flags {
        if enabled {
            entries.push((name, String::new()));
        }
    }
    if args.keep_extra {
        entries.push(("keep extra", String::new()));
    }

    let config_path = utils::unique_path_name(config_file);
    let mut contents = String::new();
    for (name, value) in entries {
        let line = format!("{}: {}", utils::capitalize(name), quoted_if_padded(&value));
        contents.push_str(line.trim());
        contents.push('\n');
    }
    std::fs::write(&config_path, contents).with_context(|| {
        format!("Could not write configuration file '{}'", config_path.display())
    })?;

    cli::log!("Generated configuration file: {}", config_path.display());
    Ok(config_path)
}
