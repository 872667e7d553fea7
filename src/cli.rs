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

//! The command line surface.
//!
//! One action runs per invocation; the default action is creating a new
//! backup. Every boolean option `--X` has a `--no-X` negation that wins when
//! both are present, so a configuration file option can be cancelled from
//! the command line.

use anyhow::{Result, bail};
use chrono::NaiveDateTime;
use clap::{ArgGroup, Parser};

use crate::{
    config,
    errors::CommandLineError,
    layout,
    ui::prompt::{Console, Prompter, Scripted},
};

#[derive(Parser, Debug, Default, Clone)]
#[clap(
    name = "vintagebackup",
    version,
    about = "A backup utility that combines the best aspects of full and incremental backups.",
    long_about = "A backup utility that combines the best aspects of full and incremental \
                  backups.\n\nEvery run creates a new dated folder at the backup location \
                  containing a copy of every file in the folder being backed up. Files that are \
                  unchanged since the previous backup are hard-linked to the copy in that \
                  backup instead of taking up more space, so each dated folder is a complete \
                  backup even when years of them are kept."
)]
#[clap(group = ArgGroup::new("action").multiple(false))]
#[clap(group = ArgGroup::new("link_probability").multiple(false))]
#[clap(group = ArgGroup::new("move_selection").multiple(false))]
#[clap(group = ArgGroup::new("restore_source").multiple(false))]
#[clap(group = ArgGroup::new("restore_extras").multiple(false))]
pub struct Cli {
    // -- Actions --
    /// Recover a file or folder from the backup, choosing which version by
    /// backup date. Requires --backup-folder.
    #[clap(short = 'r', long, value_name = "PATH", group = "action")]
    pub recover: Option<String>,

    /// Recover something in the given directory (default: the current one)
    /// by picking from a list of everything ever backed up there.
    #[clap(long, value_name = "DIRECTORY", num_args = 0..=1, default_missing_value = ".", group = "action")]
    pub list: Option<String>,

    /// Move backups to a new location, recreating the hard links between
    /// them. Requires --backup-folder and one of the move selection options.
    #[clap(long, value_name = "NEW_BACKUP_LOCATION", group = "action")]
    pub move_backup: Option<String>,

    /// Verify the latest backup against the original files, writing lists of
    /// matching, mismatching, and erroring files to the given folder.
    #[clap(long, value_name = "RESULT_DIR", group = "action")]
    pub verify: Option<String>,

    /// List the files that survive the --filter file, to the given file or
    /// to the console.
    #[clap(long, value_name = "FILE_NAME", num_args = 0..=1, default_missing_value = "", group = "action")]
    pub preview_filter: Option<String>,

    /// Restore the user's folder to a backed up state. See the restore
    /// options below.
    #[clap(long, group = "action")]
    pub restore: bool,

    /// Delete a file or folder from all backups. Requires --backup-folder.
    #[clap(long, value_name = "PATH", group = "action")]
    pub purge: Option<String>,

    /// Purge something in the given directory (default: the current one) by
    /// picking from a list of everything ever backed up there.
    #[clap(long, value_name = "DIRECTORY", num_args = 0..=1, default_missing_value = ".", group = "action")]
    pub purge_list: Option<String>,

    /// Delete old backups according to --free-up and --delete-after without
    /// running a backup first.
    #[clap(long, group = "action")]
    pub delete_only: bool,

    /// Generate a configuration file matching the other arguments.
    #[clap(long, value_name = "FILE_NAME")]
    pub generate_config: Option<String>,

    /// Generate scripts and a config file for Windows Task Scheduler.
    #[clap(long, value_name = "DIRECTORY")]
    pub generate_windows_scripts: Option<String>,

    // -- Backup options --
    /// The directory to be backed up, recursively.
    #[clap(short = 'u', long, value_name = "FOLDER")]
    pub user_folder: Option<String>,

    /// The destination of the backups: year folders, each containing that
    /// year's dated backups.
    #[clap(short = 'b', long, value_name = "FOLDER")]
    pub backup_folder: Option<String>,

    /// A file of signed glob patterns choosing which files are backed up.
    #[clap(short = 'f', long, value_name = "FILTER_FILE_NAME")]
    pub filter: Option<String>,

    /// Examine the entire contents of files to decide whether they changed,
    /// instead of just size, kind, and modification time.
    #[clap(short = 'w', long)]
    pub whole_file: bool,

    /// Disable --whole-file, even if a configuration file enables it.
    #[clap(long)]
    pub no_whole_file: bool,

    /// After a successful backup, delete old backups until this much space
    /// is free at the backup location.
    #[clap(long, value_name = "SPACE")]
    pub free_up: Option<String>,

    /// After a successful backup, delete backups older than this time span
    /// (Nd, Nw, Nm, or Ny).
    #[clap(long, value_name = "TIME")]
    pub delete_after: Option<String>,

    /// The maximum number of backup deletions per program run.
    #[clap(long, value_name = "N")]
    pub max_deletions: Option<String>,

    /// Delete old backups before running the backup instead of after.
    #[clap(long)]
    pub delete_first: bool,

    /// Disable --delete-first, even if a configuration file enables it.
    #[clap(long)]
    pub no_delete_first: bool,

    /// Copy all files instead of hard-linking unchanged files.
    #[clap(long)]
    pub force_copy: bool,

    /// Disable --force-copy, even if a configuration file enables it.
    #[clap(long)]
    pub no_force_copy: bool,

    /// The average number of hard links to make for an unchanged file before
    /// copying it again (unchanged files copy with probability 1/(N + 1)).
    #[clap(long, value_name = "HARD_LINK_COUNT", group = "link_probability")]
    pub hard_link_count: Option<String>,

    /// The probability that an unchanged file is copied instead of
    /// hard-linked, as a decimal (0.1) or percentage (10%).
    #[clap(long, value_name = "PROBABILITY", group = "link_probability")]
    pub copy_probability: Option<String>,

    /// Thin backups older than this time span to one per week.
    #[clap(long, value_name = "TIME")]
    pub keep_weekly_after: Option<String>,

    /// Thin backups older than this time span to one per month.
    #[clap(long, value_name = "TIME")]
    pub keep_monthly_after: Option<String>,

    /// Thin backups older than this time span to one per year.
    #[clap(long, value_name = "TIME")]
    pub keep_yearly_after: Option<String>,

    // -- Recover options --
    /// Find the version to recover by binary search: recover a version, then
    /// answer whether an older or newer one is needed.
    #[clap(long)]
    pub search: bool,

    // -- Move backup options --
    /// The number of most recent backups to move, or "all".
    #[clap(long, value_name = "N", group = "move_selection")]
    pub move_count: Option<String>,

    /// Move backups no older than this time span.
    #[clap(long, value_name = "TIME", group = "move_selection")]
    pub move_age: Option<String>,

    /// Move backups made on or after this date (YYYY-MM-DD).
    #[clap(long, value_name = "DATE", group = "move_selection")]
    pub move_since: Option<String>,

    // -- Restore options --
    /// Restore from the most recent backup.
    #[clap(long, group = "restore_source")]
    pub last_backup: bool,

    /// Choose which backup to restore from a list.
    #[clap(long, group = "restore_source")]
    pub choose_backup: bool,

    /// Delete files in the destination that are not in the backup.
    #[clap(long, group = "restore_extras")]
    pub delete_extra: bool,

    /// Preserve files in the destination that are not in the backup.
    #[clap(long, group = "restore_extras")]
    pub keep_extra: bool,

    /// Restore to a different destination than the backed up folder.
    #[clap(long, value_name = "FOLDER")]
    pub destination: Option<String>,

    // -- Other options --
    /// Read options from a configuration file. Command line options override
    /// conflicting options from the file.
    #[clap(short = 'c', long, value_name = "FILE_NAME")]
    pub config: Option<String>,

    /// Log all actions during a program run.
    #[clap(long)]
    pub debug: bool,

    /// Disable --debug, even if a configuration file enables it.
    #[clap(long)]
    pub no_debug: bool,

    /// Where to log the activity of this program. Defaults to
    /// vintagebackup.log in the home folder. Use the null device for no log.
    #[clap(short = 'l', long, value_name = "FILE_NAME")]
    pub log: Option<String>,

    /// Where to copy log lines that are warnings or errors.
    #[clap(long, value_name = "FILE_NAME")]
    pub error_log: Option<String>,

    // -- Testing hooks --
    /// Scripted responses consumed instead of interactive prompts.
    #[clap(long, hide = true)]
    pub choice: Vec<String>,

    /// Use a fixed timestamp for the new backup (YYYY-MM-DD HH-MM-SS).
    #[clap(long, hide = true)]
    pub timestamp: Option<String>,

    /// Skip the confirmation prompt when restoring.
    #[clap(long, hide = true)]
    pub skip_prompt: bool,
}

/// Whether a boolean option --X is selected and not negated by --no-X.
fn toggle_is_set(value: bool, negation: bool) -> bool {
    value && !negation
}

impl Cli {
    pub fn whole_file_enabled(&self) -> bool {
        toggle_is_set(self.whole_file, self.no_whole_file)
    }

    pub fn delete_first_enabled(&self) -> bool {
        toggle_is_set(self.delete_first, self.no_delete_first)
    }

    pub fn force_copy_enabled(&self) -> bool {
        toggle_is_set(self.force_copy, self.no_force_copy)
    }

    pub fn debug_enabled(&self) -> bool {
        toggle_is_set(self.debug, self.no_debug)
    }

    /// Whether any post-backup deletion option is present.
    pub fn has_deletion_criteria(&self) -> bool {
        self.free_up.is_some()
            || self.delete_after.is_some()
            || self.keep_weekly_after.is_some()
            || self.keep_monthly_after.is_some()
            || self.keep_yearly_after.is_some()
    }

    /// The manually set timestamp for new backups, if any.
    pub fn parsed_timestamp(&self) -> Result<Option<NaiveDateTime>> {
        let Some(timestamp) = &self.timestamp else {
            return Ok(None);
        };
        match NaiveDateTime::parse_from_str(timestamp, layout::BACKUP_DATE_FORMAT) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => bail!(CommandLineError(format!(
                "Invalid timestamp (expected {}): {timestamp}",
                layout::BACKUP_DATE_FORMAT
            ))),
        }
    }

    /// The source of interactive answers: scripted when --choice responses
    /// were given, otherwise the terminal.
    pub fn prompter(&self) -> Box<dyn Prompter> {
        if self.choice.is_empty() {
            Box::new(Console)
        } else {
            Box::new(Scripted::new(&self.choice))
        }
    }

    /// Fill unset options from another parsed set (the configuration file).
    /// Command line options keep priority.
    fn merge_defaults(mut self, defaults: Cli) -> Cli {
        macro_rules! take_default {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = defaults.$field;
                }
            };
        }
        macro_rules! either {
            ($field:ident) => {
                self.$field = self.$field || defaults.$field;
            };
        }

        take_default!(recover);
        take_default!(list);
        take_default!(move_backup);
        take_default!(verify);
        take_default!(preview_filter);
        take_default!(purge);
        take_default!(purge_list);
        take_default!(generate_config);
        take_default!(generate_windows_scripts);
        take_default!(user_folder);
        take_default!(backup_folder);
        take_default!(filter);
        take_default!(free_up);
        take_default!(delete_after);
        take_default!(max_deletions);
        take_default!(hard_link_count);
        take_default!(copy_probability);
        take_default!(keep_weekly_after);
        take_default!(keep_monthly_after);
        take_default!(keep_yearly_after);
        take_default!(move_count);
        take_default!(move_age);
        take_default!(move_since);
        take_default!(destination);
        take_default!(log);
        take_default!(error_log);
        take_default!(timestamp);

        either!(restore);
        either!(delete_only);
        either!(whole_file);
        either!(no_whole_file);
        either!(delete_first);
        either!(no_delete_first);
        either!(force_copy);
        either!(no_force_copy);
        either!(search);
        either!(last_backup);
        either!(choose_backup);
        either!(delete_extra);
        either!(keep_extra);
        either!(debug);
        either!(no_debug);
        either!(skip_prompt);

        if self.choice.is_empty() {
            self.choice = defaults.choice;
        }
        self
    }
}

/// Make sure that exactly one of the listed options is present.
pub fn confirm_choice_made(options: &[(&str, bool)]) -> Result<()> {
    if options.iter().filter(|(_, present)| *present).count() == 1 {
        return Ok(());
    }

    let option_list: Vec<String> = options
        .iter()
        .map(|(name, _)| format!("--{name}"))
        .collect();
    let message = match option_list.as_slice() {
        [first, second] => {
            format!("Exactly one of the following is required: {first} or {second}")
        }
        _ => {
            let all_but_last = option_list[..option_list.len() - 1].join(", ");
            format!(
                "Exactly one of the following is required: {all_but_last}, or {}",
                option_list[option_list.len() - 1]
            )
        }
    };
    bail!(CommandLineError(message));
}

/// Parse the command line, incorporating configuration file options if
/// --config is present.
pub fn parse_command_line(argv: &[String]) -> Result<Cli> {
    let program = "vintagebackup".to_string();
    let full_argv: Vec<String> = std::iter::once(program.clone())
        .chain(argv.iter().cloned())
        .collect();
    let command_line = Cli::try_parse_from(&full_argv)?;

    let Some(config_file) = &command_line.config else {
        return Ok(command_line);
    };

    let file_options = config::read_configuration_file(std::path::Path::new(config_file))?;
    let file_argv: Vec<String> = std::iter::once(program).chain(file_options).collect();
    let file_defaults = Cli::try_parse_from(&file_argv).map_err(|error| {
        CommandLineError(format!("Invalid option in configuration file: {error}"))
    })?;
    Ok(command_line.merge_defaults(file_defaults))
}
