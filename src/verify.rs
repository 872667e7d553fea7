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

//! Verifying that the user's data is successfully backed up.

use std::{fs::File, io::Write, path::Path};

use anyhow::{Context, Result, bail};

use crate::{
    cli::Cli,
    compare,
    errors::CommandLineError,
    filter::BackupSet,
    layout,
    ui::cli,
    utils,
};

/// Verify the most recent backup by comparing its contents against the
/// user's files.
///
/// Three files are written to `result_folder`: the files that match, the
/// files that do not, and the files that caused errors during comparison.
/// Existing result files are never overwritten.
pub fn verify_last_backup(
    result_folder: &Path,
    backup_folder: &Path,
    filter_file: Option<&Path>,
) -> Result<()> {
    let Ok(user_folder) = layout::backup_source(backup_folder) else {
        bail!(CommandLineError(format!(
            "No backups found in {}",
            backup_folder.display()
        )));
    };

    if !user_folder.is_dir() {
        bail!(CommandLineError(format!(
            "Could not find user folder: {}",
            user_folder.display()
        )));
    }

    let Some(last_backup_folder) = layout::find_previous_backup(backup_folder) else {
        bail!(CommandLineError(format!(
            "No backups found in {}.",
            backup_folder.display()
        )));
    };

    match filter_file {
        Some(filter_file) => cli::log!("Filter file: {}", filter_file.display()),
        None => cli::log!("Filter file: None"),
    }
    cli::log!(
        "Verifying backup in {} by comparing against {} ...",
        backup_folder.display(),
        user_folder.display()
    );

    std::fs::create_dir_all(result_folder).with_context(|| {
        format!("Could not create result folder '{}'", result_folder.display())
    })?;
    let matching_file_name = utils::unique_path_name(&result_folder.join("matching files.txt"));
    let mismatching_file_name =
        utils::unique_path_name(&result_folder.join("mismatching files.txt"));
    let error_file_name = utils::unique_path_name(&result_folder.join("error files.txt"));

    let mut matching_file = File::create(&matching_file_name)?;
    let mut mismatching_file = File::create(&mismatching_file_name)?;
    let mut error_file = File::create(&error_file_name)?;
    for file in [&mut matching_file, &mut mismatching_file, &mut error_file] {
        writeln!(
            file,
            "Comparison: {} <---> {}",
            user_folder.display(),
            backup_folder.display()
        )?;
    }

    let mut backup_set = BackupSet::new(&user_folder, filter_file)?;
    let user_root = backup_set.user_folder().to_path_buf();
    for (directory, file_names) in backup_set.scan() {
        let relative_directory = directory.strip_prefix(&user_root).unwrap_or(Path::new(""));
        let backup_directory = last_backup_folder.join(relative_directory);
        let (matches, mismatches, errors) =
            compare::deep_comparison(&directory, &backup_directory, &file_names);

        utils::write_directory(&mut matching_file, &directory, &matches)?;
        utils::write_directory(&mut mismatching_file, &directory, &mismatches)?;
        utils::write_directory(&mut error_file, &directory, &errors)?;
    }
    backup_set.report_unused_lines();
    Ok(())
}

/// Verify the latest backup according to the command line options.
pub fn start_verify_backup(args: &Cli) -> Result<()> {
    let backup_folder = utils::get_existing_path(args.backup_folder.as_deref(), "backup folder")?;
    let Some(verify) = &args.verify else {
        bail!(CommandLineError("Verification result folder not specified.".to_string()));
    };
    let filter_file = args
        .filter
        .as_ref()
        .map(|filter| utils::absolute_path(Path::new(filter)));
    let result_folder = utils::absolute_path(Path::new(verify));
    cli::print_run_title("Verifying last backup", args.config.as_deref());
    verify_last_backup(&result_folder, &backup_folder, filter_file.as_deref())
}
