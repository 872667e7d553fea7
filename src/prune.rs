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

//! Deleting old backups.
//!
//! Backups can be deleted to reach a free storage target, because they are
//! older than a cutoff, or to thin out old backups to one per week, month,
//! or year. Deletions always start with the oldest backup, never remove the
//! most recent one, and respect the per-run deletion budget.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use chrono::{Local, NaiveDateTime};

use crate::{
    cli::Cli,
    errors::CommandLineError,
    layout,
    lock::BackupLock,
    timespan::parse_time_span_to_timepoint,
    ui::cli,
    utils,
};

/// Delete a backup and, if it is the last in its year, the year folder too.
pub fn delete_single_backup(backup: &Path) -> Result<()> {
    utils::delete_directory_tree(backup, true)?;
    if let Some(year_folder) = backup.parent()
        && std::fs::remove_dir(year_folder).is_ok()
    {
        cli::log!("Deleted empty year folder {}", year_folder.display());
    }

    if let Some(backup_location) = backup.parent().and_then(Path::parent)
        && let Ok(usage) = utils::disk_usage(backup_location)
    {
        cli::log!("Free space: {}", utils::byte_units(usage.free as f64)?);
    }
    Ok(())
}

/// Delete backups, oldest first, until a condition is met or only
/// `min_backups_remaining` are left.
fn delete_backups(
    backup_folder: &Path,
    min_backups_remaining: usize,
    first_deletion_message: &str,
    stop_deletion_condition: impl Fn(&Path) -> Result<bool>,
) -> Result<()> {
    let min_backups_remaining = min_backups_remaining.max(1);
    let all = layout::all_backups(backup_folder);
    let deletable_count = all.len().saturating_sub(min_backups_remaining);

    for (deletion_count, backup) in all[..deletable_count].iter().enumerate() {
        if stop_deletion_condition(backup)? {
            break;
        }

        if deletion_count == 0 {
            cli::log!();
            cli::log!("{first_deletion_message}");
        }
        cli::log!("Deleting oldest backup: {}", backup.display());
        delete_single_backup(backup)?;
    }

    let remaining = layout::all_backups(backup_folder);
    if let Some(oldest_backup) = remaining.first()
        && !stop_deletion_condition(oldest_backup)?
    {
        if remaining.len() == 1 {
            cli::warning!("Stopped backup deletions to preserve most recent backup.");
        } else {
            cli::log!("Stopped after reaching maximum number of deletions.");
        }
    }
    Ok(())
}

/// Delete backups, oldest first, until enough space is free at the backup
/// location. The most recent backup is never deleted.
pub fn delete_oldest_backups_for_space(
    backup_location: &Path,
    space_requirement: Option<&str>,
    min_backups_remaining: usize,
) -> Result<()> {
    let Some(space_requirement) = space_requirement else {
        return Ok(());
    };

    let total_storage = utils::disk_usage(backup_location)?.total;
    let free_storage_required = utils::parse_storage_space(space_requirement)?;
    if free_storage_required > total_storage as f64 {
        bail!(CommandLineError(format!(
            "Cannot free more storage ({}) than exists at {} ({})",
            utils::byte_units(free_storage_required)?,
            backup_location.display(),
            utils::byte_units(total_storage as f64)?
        )));
    }

    let current_free_space = utils::disk_usage(backup_location)?.free;
    let first_deletion_message = format!(
        "Deleting old backups to free up {} ({} currently free).",
        utils::byte_units(free_storage_required)?,
        utils::byte_units(current_free_space as f64)?
    );

    delete_backups(
        backup_location,
        min_backups_remaining,
        &first_deletion_message,
        |_backup| Ok(utils::disk_usage(backup_location)?.free as f64 > free_storage_required),
    )
}

/// Delete backups older than a given time span. The most recent backup is
/// never deleted.
pub fn delete_backups_older_than(
    backup_folder: &Path,
    time_span: Option<&str>,
    min_backups_remaining: usize,
    now: NaiveDateTime,
) -> Result<()> {
    let Some(time_span) = time_span else {
        return Ok(());
    };

    let timestamp_to_keep = parse_time_span_to_timepoint(time_span, now)?;
    let first_deletion_message = format!(
        "Deleting backups prior to {}.",
        timestamp_to_keep.format("%Y-%m-%d %H:%M:%S")
    );

    delete_backups(
        backup_folder,
        min_backups_remaining,
        &first_deletion_message,
        |backup| Ok(layout::backup_datetime(backup)? >= timestamp_to_keep),
    )
}

/// Time spans after which backups are thinned to one per week, month, and
/// year.
#[derive(Debug, Default, Clone, Copy)]
pub struct RarefactionSpans<'a> {
    pub keep_weekly_after: Option<&'a str>,
    pub keep_monthly_after: Option<&'a str>,
    pub keep_yearly_after: Option<&'a str>,
}

impl<'a> RarefactionSpans<'a> {
    pub fn from_args(args: &'a Cli) -> Self {
        Self {
            keep_weekly_after: args.keep_weekly_after.as_deref(),
            keep_monthly_after: args.keep_monthly_after.as_deref(),
            keep_yearly_after: args.keep_yearly_after.as_deref(),
        }
    }

    pub fn any_set(&self) -> bool {
        self.keep_weekly_after.is_some()
            || self.keep_monthly_after.is_some()
            || self.keep_yearly_after.is_some()
    }

    fn bands(&self) -> [(&'static str, &'static str, Option<&'a str>); 3] {
        [
            ("7d", "weekly", self.keep_weekly_after),
            ("1m", "monthly", self.keep_monthly_after),
            ("1y", "yearly", self.keep_yearly_after),
        ]
    }
}

/// Make sure less frequent retention time spans are longer than more
/// frequent ones.
fn check_time_span_parameters(spans: &RarefactionSpans, now: NaiveDateTime) -> Result<()> {
    let mut last_cutoff: Option<NaiveDateTime> = None;
    let mut last_period_word = "";
    let mut last_time_span = "";
    for (_, period_word, time_span) in spans.bands() {
        let Some(time_span) = time_span else {
            continue;
        };

        let date_cutoff = parse_time_span_to_timepoint(time_span, now)?;
        if let Some(last) = last_cutoff
            && date_cutoff >= last
        {
            bail!(CommandLineError(format!(
                "The {period_word} time span ({time_span}) is not longer than the \
                 {last_period_word} time span ({last_time_span}). Less frequent backup specs \
                 must have longer time spans."
            )));
        }

        last_cutoff = Some(date_cutoff);
        last_period_word = period_word;
        last_time_span = time_span;
    }
    Ok(())
}

/// Thin out old backups so that only weekly, monthly, and yearly backups
/// remain past the configured ages.
pub fn delete_too_frequent_backups(
    backup_folder: &Path,
    spans: &RarefactionSpans,
    min_backups_remaining: usize,
    now: NaiveDateTime,
) -> Result<()> {
    check_time_span_parameters(spans, now)?;

    let min_backups_remaining = min_backups_remaining.max(1);
    let max_deletions = layout::all_backups(backup_folder)
        .len()
        .saturating_sub(min_backups_remaining);
    let mut deletion_count = 0;

    for (period, period_word, time_span) in spans.bands() {
        let Some(time_span) = time_span else {
            continue;
        };

        let date_cutoff = parse_time_span_to_timepoint(time_span, now)?;
        let mut backups: Vec<PathBuf> = layout::all_backups(backup_folder)
            .into_iter()
            .filter(|backup| {
                layout::backup_datetime(backup)
                    .map(|date| date < date_cutoff)
                    .unwrap_or(false)
            })
            .collect();

        while backups.len() > 1 {
            if deletion_count >= max_deletions {
                return Ok(());
            }

            let standard_timestamp = layout::backup_datetime(&backups[0])?;
            let next_timestamp = layout::backup_datetime(&backups[1])?;
            // The next backup is too frequent when stepping one period back
            // from it still lands after the standard.
            if parse_time_span_to_timepoint(period, next_timestamp)? < standard_timestamp {
                let next_backup = backups.remove(1);
                cli::log!("Deleting backup ({period_word}) {}", next_backup.display());
                deletion_count += 1;
                delete_single_backup(&next_backup)?;
            } else {
                backups.remove(0);
            }
        }
    }
    Ok(())
}

/// Log information about the storage space of the backup medium.
pub fn print_backup_storage_stats(backup_location: &Path) -> Result<()> {
    let backup_storage = utils::disk_usage(backup_location)?;
    let used = backup_storage.total.saturating_sub(backup_storage.free);
    let percent_used = (100.0 * used as f64 / backup_storage.total as f64).round();
    let percent_free = (100.0 * backup_storage.free as f64 / backup_storage.total as f64).round();
    cli::log!();
    cli::log!(
        "Backup storage space: Total = {}  Used = {} ({percent_used}%)  Free = {} ({percent_free}%)",
        utils::byte_units(backup_storage.total as f64)?,
        utils::byte_units(used as f64)?,
        utils::byte_units(backup_storage.free as f64)?
    );

    let backups = layout::all_backups(backup_location);
    cli::log!("Backups stored: {}", backups.len());
    if let Some(earliest) = backups.first() {
        cli::log!(
            "Earliest backup: {}",
            earliest.file_name().unwrap_or_default().to_string_lossy()
        );
    }
    Ok(())
}

/// Delete the oldest backups by the criteria in the command line options.
pub fn delete_old_backups(args: &Cli) -> Result<()> {
    let backup_folder = utils::get_existing_path(args.backup_folder.as_deref(), "backup folder")?;
    let backup_count = layout::all_backups(&backup_folder).len();
    let max_deletions = match &args.max_deletions {
        Some(text) => text.parse::<usize>().map_err(|_| {
            CommandLineError(format!("Invalid value for --max-deletions: {text}"))
        })?,
        None => backup_count,
    };
    let min_backups_remaining = backup_count.saturating_sub(max_deletions).max(1);
    let now = args
        .parsed_timestamp()?
        .unwrap_or_else(|| Local::now().naive_local());

    delete_too_frequent_backups(
        &backup_folder,
        &RarefactionSpans::from_args(args),
        min_backups_remaining,
        now,
    )?;
    delete_oldest_backups_for_space(
        &backup_folder,
        args.free_up.as_deref(),
        min_backups_remaining,
    )?;
    delete_backups_older_than(
        &backup_folder,
        args.delete_after.as_deref(),
        min_backups_remaining,
        now,
    )?;
    print_backup_storage_stats(&backup_folder)
}

/// Delete old backups without running a backup first.
pub fn start_delete_only(args: &Cli) -> Result<()> {
    let backup_folder = utils::get_existing_path(args.backup_folder.as_deref(), "backup folder")?;
    let _lock = BackupLock::acquire(&backup_folder, "deletion")?;
    cli::print_run_title("Deleting old backups", args.config.as_deref());
    delete_old_backups(args)
}
