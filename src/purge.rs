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

//! Deleting a file or folder from every backup.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};

use crate::{
    cli::Cli,
    errors::CommandLineError,
    layout,
    lock::BackupLock,
    recover,
    ui::{cli, prompt::Prompter},
    utils::{self, PathKind},
};

/// If a purge target appears as more than one kind of item across backups,
/// choose which kinds to delete.
fn choose_types_to_delete(
    paths_to_delete: &[PathBuf],
    path_type_counts: &BTreeMap<PathKind, usize>,
    prompter: &mut dyn Prompter,
) -> Result<Vec<PathKind>> {
    if path_type_counts.len() == 1 {
        return Ok(vec![utils::classify_path(&paths_to_delete[0])]);
    }

    let mut menu_choices: Vec<String> = path_type_counts
        .iter()
        .map(|(path_type, count)| format!("{path_type}s ({count} items)"))
        .collect();
    menu_choices.push(format!("All ({} items)", paths_to_delete.len()));
    let choice = prompter.choose(
        &menu_choices,
        "Multiple types of paths were found. Which one should be deleted?\nChoice",
    )?;

    let type_choices: Vec<PathKind> = path_type_counts.keys().copied().collect();
    Ok(if choice == type_choices.len() {
        type_choices
    } else {
        vec![type_choices[choice]]
    })
}

/// Purge a file or folder by deleting it from all backups.
pub fn purge_path(
    purge_target: &Path,
    backup_folder: &Path,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let relative_purge_target = recover::path_relative_to_backups(purge_target, backup_folder)?;

    let backup_list = layout::all_backups(backup_folder);
    let paths_to_delete: Vec<PathBuf> = backup_list
        .iter()
        .map(|backup| backup.join(&relative_purge_target))
        .filter(|path| utils::exists_without_following(path))
        .collect();
    if paths_to_delete.is_empty() {
        cli::log!(
            "Could not find any backed up copies of {}",
            purge_target.display()
        );
        return Ok(());
    }

    let mut path_type_counts: BTreeMap<PathKind, usize> = BTreeMap::new();
    for path in &paths_to_delete {
        *path_type_counts.entry(utils::classify_path(path)).or_default() += 1;
    }
    let types_to_delete = choose_types_to_delete(&paths_to_delete, &path_type_counts, prompter)?;

    let type_list: Vec<String> = types_to_delete
        .iter()
        .map(|path_type| {
            cli::plural_noun(
                path_type_counts.get(path_type).copied().unwrap_or_default(),
                &path_type.to_string(),
            )
        })
        .collect();
    cli::log!("Path to be purged from backups: {}", purge_target.display());
    let prompt = format!(
        "The following items will be deleted: {}.\nProceed? [y/n] ",
        type_list.join(", ")
    );
    let confirmation = prompter.line(&prompt)?;
    if confirmation.trim().to_lowercase() != "y" {
        return Ok(());
    }

    for path in &paths_to_delete {
        let path_type = utils::classify_path(path);
        if types_to_delete.contains(&path_type) {
            cli::log!("Deleting {path_type} {} ...", path.display());
            utils::delete_path(path, true)?;
        }
    }

    let last_backup = layout::find_previous_backup(backup_folder);
    if backup_list.last() != last_backup.as_ref()
        || utils::exists_without_following(&layout::staging_folder(backup_folder))
    {
        cli::warning!(
            "A backup to {} ran during purging. You may want to rerun the purge after the \
             backup completes.",
            backup_folder.display()
        );
    }

    cli::log!("If you want to prevent the purged item from being backed up in the future,");
    cli::log!("consider adding the following line to a filter file:");
    let filter_line = if utils::is_real_directory(purge_target) {
        relative_purge_target.join("**")
    } else {
        relative_purge_target
    };
    cli::log!("- {}", filter_line.display());
    Ok(())
}

/// Purge a file or folder from all backups according to the command line.
pub fn start_backup_purge(args: &Cli, prompter: &mut dyn Prompter) -> Result<()> {
    let backup_folder = utils::get_existing_path(args.backup_folder.as_deref(), "backup folder")?;
    let Some(purge) = &args.purge else {
        bail!(CommandLineError("Purge path not specified.".to_string()));
    };
    let purge_target = utils::absolute_path(Path::new(purge));

    let _lock = BackupLock::acquire(&backup_folder, "purge")?;
    cli::print_run_title("Purging from backups", args.config.as_deref());
    purge_path(&purge_target, &backup_folder, prompter)
}

/// Choose which path to purge from a list of everything backed up from a
/// folder.
pub fn choose_purge_target_from_backups(args: &Cli, prompter: &mut dyn Prompter) -> Result<()> {
    let backup_folder = utils::get_existing_path(args.backup_folder.as_deref(), "backup folder")?;
    let Some(purge_list_directory) = &args.purge_list else {
        bail!(CommandLineError("Purge directory not specified.".to_string()));
    };
    let chosen_purge_path = recover::choose_target_path_from_backups(
        args,
        purge_list_directory,
        "purging",
        prompter,
    )?;
    if let Some(chosen_purge_path) = chosen_purge_path {
        let _lock = BackupLock::acquire(&backup_folder, "purge")?;
        purge_path(&chosen_purge_path, &backup_folder, prompter)?;
    }
    Ok(())
}
