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

//! The backup engine.
//!
//! A new dated backup is assembled inside a staging folder and renamed into
//! its year folder only when complete, so a dated folder that exists is
//! always a full backup. Unchanged files are hard-linked to the previous
//! backup; everything else is copied. Per-file failures never abort the run:
//! failed links demote to copies and failed copies are counted and reported.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;

use crate::{
    cli::Cli,
    compare,
    errors::CommandLineError,
    filter::BackupSet,
    interrupt,
    layout,
    lock::BackupLock,
    prune,
    ui::cli,
    utils,
};

/// How a new dated backup should be created.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupOptions<'a> {
    /// A file of path patterns that include/exclude files from the backup.
    pub filter_file: Option<&'a Path>,
    /// Examine file contents instead of just size, kind, and times.
    pub examine_whole_file: bool,
    /// Copy all files, even when a previous backup could be linked against.
    pub force_copy: bool,
    /// Probability that an unchanged file is copied instead of hard-linked.
    pub copy_probability: f64,
    /// Timestamp of the new backup. Defaults to the current local time.
    pub timestamp: Option<NaiveDateTime>,
    /// Adjusts log phrasing when recreating backups at a new location.
    pub is_backup_move: bool,
}

/// How many files were linked, copied, or failed during one backup run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActionCounts {
    pub linked: u64,
    pub copied: u64,
    pub failed_copies: u64,
}

impl ActionCounts {
    pub fn total_backed_up(&self) -> u64 {
        self.linked + self.copied
    }
}

fn check_paths_for_validity(
    user_data_location: &Path,
    backup_location: &Path,
    filter_file: Option<&Path>,
) -> Result<()> {
    if !user_data_location.is_dir() {
        bail!(CommandLineError(format!(
            "The user folder path is not a folder: {}",
            user_data_location.display()
        )));
    }

    if utils::exists_without_following(backup_location) && !backup_location.is_dir() {
        bail!(CommandLineError(format!(
            "Backup location exists but is not a folder: {}",
            backup_location.display()
        )));
    }

    if backup_location.starts_with(user_data_location) {
        bail!(CommandLineError(format!(
            "Backup destination cannot be inside user's folder: User data: {}; Backup location: {}",
            user_data_location.display(),
            backup_location.display()
        )));
    }

    if let Some(filter_file) = filter_file
        && !filter_file.is_file()
    {
        bail!(CommandLineError(format!(
            "Filter file not found: {}",
            filter_file.display()
        )));
    }

    Ok(())
}

/// Create a hard link between unchanged backup files. Returns whether the
/// link was created.
fn create_hard_link(previous_backup: &Path, new_backup: &Path) -> bool {
    match std::fs::hard_link(previous_backup, new_backup) {
        Ok(()) => true,
        Err(error) => {
            cli::debug!("Could not create hard link due to error: {error}");
            cli::debug!("Previous backed up file: {}", previous_backup.display());
            cli::debug!("Attempted link         : {}", new_backup.display());
            false
        }
    }
}

/// Back up the files of one subfolder of the user's directory. Returns the
/// total size of copied files in bytes.
fn backup_directory(
    user_data_location: &Path,
    new_backup_path: &Path,
    last_backup_path: Option<&Path>,
    current_user_path: &Path,
    user_file_names: Vec<String>,
    action_counts: &mut ActionCounts,
    options: &BackupOptions,
) -> Result<u64> {
    let relative_path = current_user_path
        .strip_prefix(user_data_location)
        .unwrap_or(Path::new(""));
    let new_backup_directory = new_backup_path.join(relative_path);
    std::fs::create_dir_all(&new_backup_directory).with_context(|| {
        format!(
            "Could not create backup directory '{}'",
            new_backup_directory.display()
        )
    })?;

    let previous_backup_directory = last_backup_path.map(|last| last.join(relative_path));
    let (files_to_link, mut files_to_copy) = compare::compare_to_backup(
        current_user_path,
        previous_backup_directory.as_deref(),
        user_file_names,
        options.examine_whole_file,
        options.copy_probability,
    );

    for file_name in files_to_link {
        let previous_directory = previous_backup_directory
            .as_ref()
            .expect("files are only linked when a previous backup exists");
        let previous_backup = previous_directory.join(&file_name);
        let new_backup = new_backup_directory.join(&file_name);
        if create_hard_link(&previous_backup, &new_backup) {
            action_counts.linked += 1;
            cli::debug!(
                "Linked {} to {}",
                previous_backup.display(),
                new_backup.display()
            );
        } else {
            files_to_copy.push(file_name);
        }
    }

    let mut size_of_copied_files = 0;
    for file_name in files_to_copy {
        let user_file = current_user_path.join(&file_name);
        let new_backup_file = new_backup_directory.join(&file_name);
        match utils::copy_file_with_metadata(&user_file, &new_backup_file) {
            Ok(file_size) => {
                action_counts.copied += 1;
                size_of_copied_files += file_size;
                cli::debug!(
                    "Copied {} to {}",
                    user_file.display(),
                    new_backup_file.display()
                );
            }
            Err(error) => {
                cli::warning!("Could not copy {} ({error})", user_file.display());
                action_counts.failed_copies += 1;
            }
        }
    }

    Ok(size_of_copied_files)
}

/// Create a new dated backup. Returns the total size of copied files in
/// bytes.
///
/// The backup location should already exist. If no files survive filtering,
/// no dated folder is created and a warning is logged.
pub fn create_new_backup(
    user_data_location: &Path,
    backup_location: &Path,
    options: &BackupOptions,
) -> Result<u64> {
    check_paths_for_validity(user_data_location, backup_location, options.filter_file)?;

    let timestamp = options
        .timestamp
        .unwrap_or_else(|| chrono::Local::now().naive_local());
    let new_backup_path = backup_location.join(layout::backup_name(timestamp));
    let staging_backup_path = layout::staging_folder(backup_location);
    if utils::exists_without_following(&staging_backup_path) {
        cli::log!("There is a staging folder leftover from previous incomplete backup.");
        cli::log!("Deleting {} ...", staging_backup_path.display());
        utils::delete_directory_tree(&staging_backup_path, false)?;
    }

    layout::confirm_user_location_is_unchanged(user_data_location, backup_location)?;
    layout::record_user_location(user_data_location, backup_location)?;

    if options.is_backup_move {
        cli::log!("Original backup  : {}", user_data_location.display());
        cli::log!("Temporary backup : {}", new_backup_path.display());
    } else {
        cli::log!("User's data      : {}", user_data_location.display());
        cli::log!("Backup location  : {}", new_backup_path.display());
    }
    cli::log!("Staging area     : {}", staging_backup_path.display());

    let last_backup_path = if options.force_copy {
        None
    } else {
        layout::find_previous_backup(backup_location)
    };
    if let Some(last_backup_path) = &last_backup_path {
        cli::log!("Previous backup  : {}", last_backup_path.display());
    } else if options.force_copy {
        cli::log!("Copying everything.");
    } else {
        cli::log!("No previous backups. Copying everything.");
    }

    cli::log!();
    cli::log!("Reading file contents = {}", options.examine_whole_file);
    match options.filter_file {
        Some(filter_file) => cli::log!("Filter file: {}", filter_file.display()),
        None => cli::log!("Filter file: None"),
    }
    cli::log!("Running backup ...");

    let mut action_counts = ActionCounts::default();
    let mut size_of_backup = 0;
    let mut backup_set = BackupSet::new(user_data_location, options.filter_file)?;
    let user_root = backup_set.user_folder().to_path_buf();
    for (current_user_path, user_file_names) in backup_set.scan() {
        if interrupt::interrupted() {
            bail!("Backup interrupted before completion.");
        }
        size_of_backup += backup_directory(
            &user_root,
            &staging_backup_path,
            last_backup_path.as_deref(),
            &current_user_path,
            user_file_names,
            &mut action_counts,
            options,
        )?;
    }
    backup_set.report_unused_lines();

    if staging_backup_path.is_dir() {
        if let Some(year_folder) = new_backup_path.parent() {
            std::fs::create_dir_all(year_folder).with_context(|| {
                format!("Could not create year folder '{}'", year_folder.display())
            })?;
        }
        std::fs::rename(&staging_backup_path, &new_backup_path).with_context(|| {
            format!(
                "Could not publish backup to '{}'",
                new_backup_path.display()
            )
        })?;
    }

    report_backup_file_counts(&action_counts);
    Ok(size_of_backup)
}

/// Log the number of files that were backed up, hard-linked, copied, and
/// failed to copy.
fn report_backup_file_counts(action_counts: &ActionCounts) {
    cli::log!();
    let total_files = action_counts.total_backed_up();
    let rows = [
        ("Linked files", action_counts.linked),
        ("Copied files", action_counts.copied),
        ("Failed copies", action_counts.failed_copies),
        ("Backed up files", total_files),
    ];
    let name_column_size = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let count_column_size = rows
        .iter()
        .map(|(_, count)| count.to_string().len())
        .max()
        .unwrap_or(1);
    for (name, count) in rows {
        cli::log!("{name:<name_column_size$} : {count:>count_column_size$}");
    }

    if total_files == 0 {
        cli::warning!("No files were backed up!");
    }
}

/// Convert an expected average hard link count into a copy probability.
///
/// Randomly copying a small fraction of unchanged files keeps more than one
/// physical copy of long-unchanged data in the backup set and caps how many
/// links any one inode accumulates. With an average hard link count of h,
/// every unchanged file is copied with probability 1/(h + 1).
pub fn copy_probability_from_hard_link_count(hard_link_count: &str) -> Result<f64> {
    let average_hard_link_count: i64 = hard_link_count.parse().map_err(|_| {
        CommandLineError(format!(
            "Invalid value for hard link count: {hard_link_count}"
        ))
    })?;

    if average_hard_link_count < 1 {
        bail!(CommandLineError(format!(
            "Hard link count must be a positive whole number. Got: {hard_link_count}"
        )));
    }

    cli::log!("Maximum average hard link count = {average_hard_link_count}");
    Ok(1.0 / (average_hard_link_count as f64 + 1.0))
}

/// Parse a copy probability expressed as a decimal (0.1) or percent (10%).
pub fn parse_probability(probability_text: &str) -> Result<f64> {
    let divisor = if probability_text.ends_with('%') {
        100.0
    } else {
        1.0
    };
    let number: f64 = probability_text
        .trim_end_matches('%')
        .parse()
        .map_err(|_| {
            CommandLineError(format!(
                "Value of --copy-probability must be between 0.0 and 1.0 \
                 (or 0% and 100%): {probability_text}"
            ))
        })?;
    let probability = number / divisor;
    if !(0.0..=1.0).contains(&probability) {
        bail!(CommandLineError(format!(
            "Value of --copy-probability must be between 0.0 and 1.0 \
             (or 0% and 100%): {probability_text}"
        )));
    }
    Ok(probability)
}

/// Calculate the probability of copying unchanged files from the command
/// line arguments.
pub fn copy_probability(args: &Cli) -> Result<f64> {
    if let Some(hard_link_count) = &args.hard_link_count {
        copy_probability_from_hard_link_count(hard_link_count)
    } else if let Some(probability_text) = &args.copy_probability {
        parse_probability(probability_text)
    } else {
        Ok(0.0)
    }
}

/// Log the size of the new backup and warn if it is near or over the
/// --free-up parameter, since a future backup may then run out of space.
fn log_backup_size(free_up_parameter: Option<&str>, backup_space_taken: u64) -> Result<()> {
    let free_up = utils::parse_storage_space(free_up_parameter.unwrap_or("0"))?;
    let free_up_percent = if free_up > 0.0 {
        (100.0 * backup_space_taken as f64 / free_up).ceil() as i64
    } else {
        0
    };
    let free_up_text = if free_up > 0.0 {
        format!(" ({free_up_percent}% of --free-up)")
    } else {
        String::new()
    };

    let free_up_warning_percent = 90;
    let message = format!(
        "Backup space used: {}{free_up_text}",
        utils::byte_units(backup_space_taken as f64)?
    );
    if free_up_percent >= free_up_warning_percent {
        cli::warning!("{message}");
        cli::warning!("Consider increasing the size of the --free-up parameter.");
    } else {
        cli::log!("{message}");
    }
    Ok(())
}

/// Run a backup from command line arguments, deleting old backups before or
/// after according to --delete-first.
pub fn start_backup(args: &Cli) -> Result<()> {
    let user_folder = utils::get_existing_path(args.user_folder.as_deref(), "user's folder")?;

    let Some(backup_folder) = &args.backup_folder else {
        bail!(CommandLineError("Backup folder not specified.".to_string()));
    };
    let backup_folder = utils::absolute_path(Path::new(backup_folder));
    std::fs::create_dir_all(&backup_folder).with_context(|| {
        format!(
            "Could not create backup folder '{}'",
            backup_folder.display()
        )
    })?;

    let _lock = BackupLock::acquire(&backup_folder, "backup")?;
    cli::print_run_title("Starting new backup", args.config.as_deref());

    if args.delete_first_enabled() {
        prune::delete_old_backups(args)?;
    }

    let filter_file: Option<PathBuf> = args
        .filter
        .as_ref()
        .map(|filter| utils::absolute_path(Path::new(filter)));
    let backup_space_taken = create_new_backup(
        &user_folder,
        &backup_folder,
        &BackupOptions {
            filter_file: filter_file.as_deref(),
            examine_whole_file: args.whole_file_enabled(),
            force_copy: args.force_copy_enabled(),
            copy_probability: copy_probability(args)?,
            timestamp: args.parsed_timestamp()?,
            is_backup_move: false,
        },
    )?;

    cli::log!();
    log_backup_size(args.free_up.as_deref(), backup_space_taken)?;

    if !args.delete_first_enabled() && args.has_deletion_criteria() {
        prune::delete_old_backups(args)?;
    }
    Ok(())
}
