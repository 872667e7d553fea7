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

use std::path::Path;

use anyhow::Result;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tempfile::tempdir;

use vintagebackup::{archiver, cli::Cli, layout, prune};

use crate::{backup_timestamp, create_user_data, quiet, run_backup};

#[test]
fn test_delete_after_via_command_line_options() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;

    // Two backups a minute apart, then a pruning pass dated years later.
    run_backup(&user_path, &backup_path, 0)?;
    run_backup(&user_path, &backup_path, 1)?;
    assert_eq!(layout::all_backups(&backup_path).len(), 2);

    let later = backup_timestamp(0).with_year(2030).unwrap();
    let args = Cli {
        backup_folder: Some(backup_path.to_string_lossy().into_owned()),
        delete_after: Some("1y".to_string()),
        timestamp: Some(later.format(layout::BACKUP_DATE_FORMAT).to_string()),
        ..Cli::default()
    };
    prune::delete_old_backups(&args)?;

    // Both backups are years old, but the most recent always survives.
    let remaining = layout::all_backups(&backup_path);
    assert_eq!(remaining.len(), 1);
    assert_eq!(layout::backup_datetime(&remaining[0])?, backup_timestamp(1));
    Ok(())
}

#[test]
fn test_max_deletions_via_command_line_options() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;

    for n in 0..6 {
        run_backup(&user_path, &backup_path, n)?;
    }

    let later = backup_timestamp(0).with_year(2030).unwrap();
    let args = Cli {
        backup_folder: Some(backup_path.to_string_lossy().into_owned()),
        delete_after: Some("1y".to_string()),
        max_deletions: Some("2".to_string()),
        timestamp: Some(later.format(layout::BACKUP_DATE_FORMAT).to_string()),
        ..Cli::default()
    };
    prune::delete_old_backups(&args)?;

    assert_eq!(layout::all_backups(&backup_path).len(), 4);
    Ok(())
}

#[test]
fn test_backup_action_prunes_old_backups_after_backing_up() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;

    fn moment(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn backup_args(user_path: &Path, backup_path: &Path, timestamp: NaiveDateTime) -> Cli {
        Cli {
            user_folder: Some(user_path.to_string_lossy().into_owned()),
            backup_folder: Some(backup_path.to_string_lossy().into_owned()),
            timestamp: Some(timestamp.format(layout::BACKUP_DATE_FORMAT).to_string()),
            ..Cli::default()
        }
    }

    // An ancient backup plus a cluster of daily ones.
    for timestamp in [
        moment(2023, 6, 1),
        moment(2025, 1, 1),
        moment(2025, 1, 2),
        moment(2025, 1, 3),
    ] {
        archiver::start_backup(&backup_args(&user_path, &backup_path, timestamp))?;
    }
    assert_eq!(layout::all_backups(&backup_path).len(), 4);

    // One backup action with retention options: it backs up first, then
    // thins the January cluster to one per week and deletes the backup
    // older than a year.
    let args = Cli {
        delete_after: Some("1y".to_string()),
        keep_weekly_after: Some("30d".to_string()),
        ..backup_args(&user_path, &backup_path, moment(2025, 5, 1))
    };
    archiver::start_backup(&args)?;

    let remaining: Vec<NaiveDateTime> = layout::all_backups(&backup_path)
        .iter()
        .map(|backup| layout::backup_datetime(backup))
        .collect::<Result<_>>()?;
    assert_eq!(remaining, vec![moment(2025, 1, 1), moment(2025, 5, 1)]);
    assert!(!backup_path.join("2023").exists());
    // The lock is released after the combined backup and pruning pass.
    assert!(!backup_path.join("vintagebackup.lock").exists());
    Ok(())
}

#[test]
fn test_bad_max_deletions_is_rejected() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;
    run_backup(&user_path, &backup_path, 0)?;

    let args = Cli {
        backup_folder: Some(backup_path.to_string_lossy().into_owned()),
        max_deletions: Some("several".to_string()),
        ..Cli::default()
    };
    assert!(prune::delete_old_backups(&args).is_err());
    Ok(())
}
