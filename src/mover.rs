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

//! Moving backups from one location to another.
//!
//! Each selected backup is recreated at the new location by running the
//! backup engine with the old dated backup as its source and the backup's
//! own timestamp as the new name. Running them in chronological order lets
//! the engine rebuild the hard links between consecutive backups, so the
//! space savings survive the move. The moved backups are not deleted from
//! the old location.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    archiver::{BackupOptions, create_new_backup},
    cli::{Cli, confirm_choice_made},
    errors::CommandLineError,
    layout,
    lock::BackupLock,
    timespan::parse_time_span_to_timepoint,
    ui::cli,
    utils,
};

/// Move a set of backups to a new location.
pub fn move_backups(
    old_backup_location: &Path,
    new_backup_location: &Path,
    backups_to_move: &[PathBuf],
) -> Result<()> {
    cli::log!("Moving {}", cli::plural_noun(backups_to_move.len(), "backup"));
    cli::log!("from {}", old_backup_location.display());
    cli::log!("to   {}", new_backup_location.display());

    for backup in backups_to_move {
        create_new_backup(
            backup,
            new_backup_location,
            &BackupOptions {
                filter_file: None,
                examine_whole_file: false,
                force_copy: false,
                copy_probability: 0.0,
                timestamp: Some(layout::backup_datetime(backup)?),
                is_backup_move: true,
            },
        )?;

        // The engine recorded the old dated backup as the source of the new
        // location, which would block the next move.
        let backup_source_file = layout::backup_info_file(new_backup_location);
        std::fs::remove_file(&backup_source_file).with_context(|| {
            format!("Could not remove '{}'", backup_source_file.display())
        })?;
        cli::log!("---------------------");
    }

    match layout::backup_source(old_backup_location) {
        Ok(original_backup_source) => {
            layout::record_user_location(&original_backup_source, new_backup_location)?;
        }
        Err(_) => {
            cli::warning!(
                "Could not find source of user data in {}",
                old_backup_location.display()
            );
        }
    }

    if let Some(old_log_file) = layout::backup_log_file(old_backup_location) {
        layout::record_backup_log_file(&old_log_file, new_backup_location)?;
    }
    Ok(())
}

/// The paths of the last n backups, or all of them when `n` is "all".
pub fn last_n_backups(n: &str, backup_location: &Path) -> Result<Vec<PathBuf>> {
    let backups = layout::all_backups(backup_location);
    if n.eq_ignore_ascii_case("all") {
        return Ok(backups);
    }

    let count: usize = n.parse().map_err(|_| {
        CommandLineError(format!("Value must be a positive whole number: {n}"))
    })?;
    if count < 1 {
        bail!(CommandLineError(format!(
            "Value must be a positive whole number: {n}"
        )));
    }

    let skip = backups.len().saturating_sub(count);
    Ok(backups[skip..].to_vec())
}

/// The backups created on or after a given date.
pub fn backups_since(
    oldest_backup_date: NaiveDateTime,
    backup_location: &Path,
) -> Vec<PathBuf> {
    layout::all_backups(backup_location)
        .into_iter()
        .filter(|backup| {
            layout::backup_datetime(backup)
                .map(|date| date >= oldest_backup_date)
                .unwrap_or(false)
        })
        .collect()
}

fn choose_backups_to_move(args: &Cli, old_backup_location: &Path) -> Result<Vec<PathBuf>> {
    confirm_choice_made(&[
        ("move-count", args.move_count.is_some()),
        ("move-age", args.move_age.is_some()),
        ("move-since", args.move_since.is_some()),
    ])?;

    if let Some(move_count) = &args.move_count {
        last_n_backups(move_count, old_backup_location)
    } else if let Some(move_age) = &args.move_age {
        let now = args
            .parsed_timestamp()?
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        let oldest_backup_date = parse_time_span_to_timepoint(move_age, now)?;
        Ok(backups_since(oldest_backup_date, old_backup_location))
    } else if let Some(move_since) = &args.move_since {
        let date = NaiveDate::parse_from_str(move_since, "%Y-%m-%d").map_err(|_| {
            CommandLineError(format!("Invalid date for --move-since (YYYY-MM-DD): {move_since}"))
        })?;
        let oldest_backup_date = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        Ok(backups_since(oldest_backup_date, old_backup_location))
    } else {
        unreachable!("one of the move options is required");
    }
}

/// Move backups to another location according to the command line options.
pub fn start_move_backups(args: &Cli) -> Result<()> {
    let old_backup_location =
        utils::get_existing_path(args.backup_folder.as_deref(), "current backup location")?;
    let Some(move_backup) = &args.move_backup else {
        bail!(CommandLineError("New backup location not specified.".to_string()));
    };
    let new_backup_location = utils::absolute_path(Path::new(move_backup));
    let backups_to_move = choose_backups_to_move(args, &old_backup_location)?;
    std::fs::create_dir_all(&new_backup_location).with_context(|| {
        format!(
            "Could not create new backup location '{}'",
            new_backup_location.display()
        )
    })?;

    let _lock = BackupLock::acquire(&new_backup_location, "backup move")?;
    cli::print_run_title("Moving backups", args.config.as_deref());
    move_backups(&old_backup_location, &new_backup_location, &backups_to_move)
}
