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

//! Recovering individual files and folders from backups.
//!
//! Backups holding hard-linked copies of the same file version are collapsed
//! to the oldest one, so the user only chooses between distinct versions.
//! Recovered items are copied next to the original with a numbered name, so
//! nothing existing is overwritten.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};

use crate::{
    cli::Cli,
    errors::CommandLineError,
    layout,
    ui::{cli, prompt::Prompter},
    utils,
};

/// Return a user path relative to what the backup location stores.
pub fn path_relative_to_backups(user_path: &Path, backup_location: &Path) -> Result<PathBuf> {
    let Ok(user_data_location) = layout::backup_source(backup_location) else {
        bail!(CommandLineError(format!(
            "No backups found at {}",
            backup_location.display()
        )));
    };

    match user_path.strip_prefix(&user_data_location) {
        Ok(relative) => Ok(relative.to_path_buf()),
        Err(_) => bail!(CommandLineError(format!(
            "{} is not contained in the backup set {}, which contains {}.",
            user_path.display(),
            backup_location.display(),
            user_data_location.display()
        ))),
    }
}

#[cfg(unix)]
fn file_id(path: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    path.symlink_metadata().ok().map(|metadata| metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_path: &Path) -> Option<u64> {
    None
}

/// The distinct backed up versions of a path, oldest first.
///
/// Backups whose copy shares an inode with an already seen version are
/// skipped, so each entry is a genuinely different version of the item.
pub fn distinct_backed_up_versions(
    relative_path: &Path,
    backup_location: &Path,
) -> Vec<PathBuf> {
    let mut seen_inodes: HashMap<u64, PathBuf> = HashMap::new();
    let mut versions = Vec::new();
    for backup in layout::all_backups(backup_location) {
        let path = backup.join(relative_path);
        if !utils::exists_without_following(&path) {
            continue;
        }
        match file_id(&path) {
            Some(inode) => {
                seen_inodes.entry(inode).or_insert_with(|| {
                    versions.push(path.clone());
                    path
                });
            }
            None => versions.push(path),
        }
    }
    versions
}

/// Copy a path out of a backup without clobbering existing data.
pub fn recover_path_to_original_location(
    backed_up_source: &Path,
    destination: &Path,
) -> Result<()> {
    if utils::exists_without_following(destination)
        && destination.file_name() != backed_up_source.file_name()
    {
        bail!(
            "The path to the backup and the path to the original location must have the same \
             name:\n{}\n{}",
            backed_up_source.display(),
            destination.display()
        );
    }

    let recovered_path = utils::unique_path_name(destination);
    cli::log!(
        "Copying {} to {}",
        backed_up_source.display(),
        recovered_path.display()
    );
    if utils::is_real_directory(backed_up_source) {
        utils::copy_tree(backed_up_source, &recovered_path)
    } else {
        utils::copy_file_with_metadata(backed_up_source, &recovered_path).map(|_| ())
    }
}

/// Decide which version of a file or folder to restore to its previous
/// location.
pub fn recover_path(
    recovery_path: &Path,
    backup_location: &Path,
    search: bool,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let recovery_relative_path = path_relative_to_backups(recovery_path, backup_location)?;
    let backup_choices = distinct_backed_up_versions(&recovery_relative_path, backup_location);
    if backup_choices.is_empty() {
        cli::log!("No backups found for {}", recovery_path.display());
        return Ok(());
    }

    if search {
        binary_search_recovery(recovery_path, backup_choices, prompter)
    } else {
        recover_from_menu(recovery_path, backup_location, &backup_choices, prompter)
    }
}

/// Choose which version of a path to recover from a list of backup dates.
fn recover_from_menu(
    recovery_path: &Path,
    backup_location: &Path,
    backup_choices: &[PathBuf],
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let menu_choices: Vec<String> = backup_choices
        .iter()
        .map(|backup_copy| {
            let backup_date = backup_copy
                .strip_prefix(backup_location)
                .ok()
                .and_then(|relative| relative.iter().nth(1))
                .map(|component| component.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{backup_date} ({})", utils::classify_path(backup_copy))
        })
        .collect();
    let choice = prompter.choose(&menu_choices, "Version to recover")?;
    recover_path_to_original_location(&backup_choices[choice], recovery_path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchResponse {
    Correct,
    Older,
    Newer,
}

fn prompt_for_binary_choice(
    backup_choices: &[PathBuf],
    prompter: &mut dyn Prompter,
) -> Result<SearchResponse> {
    if backup_choices.len() == 1 {
        cli::log!("Only one choice for recovery.");
        return Ok(SearchResponse::Correct);
    }

    let special_case = backup_choices.len() == 2;
    let question = if special_case {
        "Is the data [C]orrect, or do you want the [O]lder version? [c/o]"
    } else {
        "Is the data [C]orrect, or do you want an [O]lder or [N]ewer version? [c/o/n]"
    };
    cli::log!("Press {} to quit early.", cli::cancel_key());
    loop {
        let response = prompter.line(question)?;
        let Some(first) = response.trim().chars().next() else {
            continue;
        };
        match first.to_ascii_lowercase() {
            'c' => return Ok(SearchResponse::Correct),
            'o' => return Ok(SearchResponse::Older),
            'n' if !special_case => return Ok(SearchResponse::Newer),
            _ => cli::log!("Invalid response"),
        }
    }
}

/// Find the version to recover by binary search, with the user judging each
/// recovered copy as correct, too new, or too old.
fn binary_search_recovery(
    recovery_path: &Path,
    mut backup_choices: Vec<PathBuf>,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    loop {
        let index = backup_choices.len() / 2;
        recover_path_to_original_location(&backup_choices[index], recovery_path)?;

        match prompt_for_binary_choice(&backup_choices, prompter)? {
            SearchResponse::Correct => return Ok(()),
            SearchResponse::Older => backup_choices.truncate(index),
            SearchResponse::Newer => backup_choices = backup_choices.split_off(index + 1),
        }

        if backup_choices.is_empty() {
            return Ok(());
        }
    }
}

/// Choose a path from among everything ever backed up from the given
/// directory.
pub fn search_backups(
    search_directory: &Path,
    backup_folder: &Path,
    operation: &str,
    prompter: &mut dyn Prompter,
) -> Result<Option<PathBuf>> {
    if !utils::is_real_directory(search_directory) {
        bail!(CommandLineError(format!(
            "The given search path is not a directory: {}",
            search_directory.display()
        )));
    }
    let target_relative_path = path_relative_to_backups(search_directory, backup_folder)?;

    let mut all_paths: BTreeSet<(String, String)> = BTreeSet::new();
    for backup in layout::all_backups(backup_folder) {
        let backup_search_directory = backup.join(&target_relative_path);
        let Ok(entries) = std::fs::read_dir(&backup_search_directory) else {
            continue;
        };
        for entry in entries.flatten() {
            all_paths.insert((
                entry.file_name().to_string_lossy().into_owned(),
                utils::classify_path(&entry.path()).to_string(),
            ));
        }
    }

    if all_paths.is_empty() {
        cli::log!(
            "No backups found for the folder {}",
            search_directory.display()
        );
        return Ok(None);
    }

    let menu_list: Vec<(String, String)> = all_paths.into_iter().collect();
    let menu_choices: Vec<String> = menu_list
        .iter()
        .map(|(name, path_type)| format!("{name} ({path_type})"))
        .collect();
    let choice = prompter.choose(&menu_choices, &format!("Which path for {operation}"))?;
    Ok(Some(search_directory.join(&menu_list[choice].0)))
}

/// Recover a file or folder from a backup according to the command line.
pub fn start_recovery_from_backup(args: &Cli, prompter: &mut dyn Prompter) -> Result<()> {
    let backup_folder = utils::get_existing_path(args.backup_folder.as_deref(), "backup folder")?;
    let Some(recover) = &args.recover else {
        bail!(CommandLineError("Recovery path not specified.".to_string()));
    };
    cli::print_run_title("Recovering from backups", args.config.as_deref());
    recover_path(
        &utils::absolute_path(Path::new(recover)),
        &backup_folder,
        args.search,
        prompter,
    )
}

/// Choose a path from a list of backed up files and folders from a given
/// directory.
pub fn choose_target_path_from_backups(
    args: &Cli,
    search_directory: &str,
    operation: &str,
    prompter: &mut dyn Prompter,
) -> Result<Option<PathBuf>> {
    let backup_folder = utils::get_existing_path(args.backup_folder.as_deref(), "backup folder")?;
    let search_directory = utils::absolute_path(Path::new(search_directory));
    cli::print_run_title(
        &format!("Listing files and directories for {operation}"),
        args.config.as_deref(),
    );
    cli::log!(
        "Searching for everything backed up from {} ...",
        search_directory.display()
    );
    search_backups(&search_directory, &backup_folder, operation, prompter)
}

/// Choose what to recover from a list of everything backed up from a folder.
pub fn choose_recovery_target_from_backups(
    args: &Cli,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let backup_folder = utils::get_existing_path(args.backup_folder.as_deref(), "backup folder")?;
    let Some(list_directory) = &args.list else {
        bail!(CommandLineError("List directory not specified.".to_string()));
    };
    let chosen_recovery_path =
        choose_target_path_from_backups(args, list_directory, "recovery", prompter)?;
    if let Some(chosen_recovery_path) = chosen_recovery_path {
        recover_path(&chosen_recovery_path, &backup_folder, args.search, prompter)?;
    }
    Ok(())
}
