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

//! Returning a user's folder to a previously backed up state.

use std::{
    collections::HashSet,
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};

use crate::{
    cli::{Cli, confirm_choice_made},
    errors::CommandLineError,
    layout,
    lock::BackupLock,
    ui::{cli, prompt::Prompter},
    utils,
};

/// Choose a backup from a numbered list shown in a terminal.
pub fn choose_backup(
    backup_folder: &Path,
    prompter: &mut dyn Prompter,
) -> Result<Option<PathBuf>> {
    let backup_choices = layout::all_backups(backup_folder);
    if backup_choices.is_empty() {
        return Ok(None);
    }

    let menu_choices: Vec<String> = backup_choices
        .iter()
        .map(|backup| {
            backup
                .strip_prefix(backup_folder)
                .unwrap_or(backup)
                .display()
                .to_string()
        })
        .collect();
    let choice = prompter.choose(&menu_choices, "Backup to restore")?;
    Ok(Some(backup_choices[choice].clone()))
}

/// Return a folder to a previously backed up state.
///
/// Existing files that were backed up are overwritten with the backup copy.
/// With `delete_extra_files`, anything in the destination that is not in the
/// backup is deleted.
pub fn restore_backup(
    dated_backup_folder: &Path,
    destination: &Path,
    delete_extra_files: bool,
) -> Result<()> {
    let backup_location = dated_backup_folder
        .parent()
        .and_then(Path::parent)
        .with_context(|| {
            format!(
                "Not a dated backup folder: {}",
                dated_backup_folder.display()
            )
        })?;
    let user_folder = layout::backup_source(backup_location)?;
    cli::log!("Restoring: {}", user_folder.display());
    cli::log!("From     : {}", dated_backup_folder.display());
    cli::log!("Deleting extra files: {delete_extra_files}");
    if utils::absolute_path(&user_folder) != utils::absolute_path(destination) {
        cli::log!("Restoring to: {}", destination.display());
    }

    let mut stack = vec![dated_backup_folder.to_path_buf()];
    while let Some(current_backup_path) = stack.pop() {
        let relative_path = current_backup_path
            .strip_prefix(dated_backup_folder)
            .unwrap_or(Path::new(""));
        let current_user_folder = destination.join(relative_path);
        cli::debug!("Creating {}", current_user_folder.display());
        std::fs::create_dir_all(&current_user_folder).with_context(|| {
            format!("Could not create '{}'", current_user_folder.display())
        })?;

        let entries = match std::fs::read_dir(&current_backup_path) {
            Ok(entries) => entries,
            Err(error) => {
                cli::warning!(
                    "Could not read {}: {error}",
                    current_backup_path.display()
                );
                continue;
            }
        };

        let mut backed_up_names: HashSet<OsString> = HashSet::new();
        for entry in entries.flatten() {
            let backup_path = entry.path();
            backed_up_names.insert(entry.file_name());
            if utils::is_real_directory(&backup_path) {
                stack.push(backup_path);
                continue;
            }

            let file_destination = current_user_folder.join(entry.file_name());
            cli::debug!(
                "Copying {} from {} to {}",
                entry.file_name().to_string_lossy(),
                current_backup_path.display(),
                current_user_folder.display()
            );
            if utils::exists_without_following(&file_destination) {
                // Replace instead of overwriting so hard links into the
                // backup set are not written through.
                utils::delete_path(&file_destination, true)?;
            }
            if let Err(error) = utils::copy_file_with_metadata(&backup_path, &file_destination) {
                cli::warning!(
                    "Could not restore {} from {}: {error}",
                    file_destination.display(),
                    backup_path.display()
                );
            }
        }

        if delete_extra_files {
            let user_entries = match std::fs::read_dir(&current_user_folder) {
                Ok(entries) => entries,
                Err(error) => {
                    cli::warning!(
                        "Could not read {}: {error}",
                        current_user_folder.display()
                    );
                    continue;
                }
            };
            for entry in user_entries.flatten() {
                if !backed_up_names.contains(&entry.file_name()) {
                    let extra_path = entry.path();
                    cli::debug!("Deleting extra item {}", extra_path.display());
                    utils::delete_path(&extra_path, true)?;
                }
            }
        }
    }
    Ok(())
}

/// Restore a backup according to the command line arguments.
pub fn start_backup_restore(args: &Cli, prompter: &mut dyn Prompter) -> Result<()> {
    let backup_folder = utils::get_existing_path(args.backup_folder.as_deref(), "backup folder")?;
    let Some(destination) = &args.destination else {
        bail!(CommandLineError(
            "The --destination argument is required for restoring backups.".to_string()
        ));
    };
    let destination = utils::absolute_path(Path::new(destination));
    confirm_choice_made(&[
        ("delete-extra", args.delete_extra),
        ("keep-extra", args.keep_extra),
    ])?;
    let delete_extra_files = args.delete_extra;

    confirm_choice_made(&[
        ("last-backup", args.last_backup),
        ("choose-backup", args.choose_backup),
    ])?;

    let _lock = BackupLock::acquire(&backup_folder, "restore")?;
    cli::print_run_title("Restoring user data from backup", args.config.as_deref());

    let restore_source = if args.last_backup {
        layout::find_previous_backup(&backup_folder)
    } else {
        choose_backup(&backup_folder, prompter)?
    };
    let Some(restore_source) = restore_source else {
        bail!(CommandLineError(format!(
            "No backups found in {}",
            backup_folder.display()
        )));
    };

    let required_response = "yes";
    cli::log!(
        "This will overwrite all files in {} and subfolders with files in {}.",
        destination.display(),
        restore_source.display()
    );
    if delete_extra_files {
        cli::log!(
            "Any files that were not backed up, including newly created files and files not \
             backed up because of --filter, will be deleted."
        );
    }

    let response = if args.skip_prompt {
        required_response.to_string()
    } else {
        prompter.line(&format!(
            "Do you want to continue? Type \"{required_response}\" to proceed or press {} to \
             cancel: ",
            cli::cancel_key()
        ))?
    };

    if response.trim().to_lowercase() == required_response {
        restore_backup(&restore_source, &destination, delete_extra_files)
    } else {
        cli::log!(
            "The response was \"{response}\" and not \"{required_response}\", so the restoration \
             is cancelled."
        );
        Ok(())
    }
}
