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

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tempfile::tempdir;

use vintagebackup::{
    archiver::{self, BackupOptions, create_new_backup},
    cli::Cli,
    errors::{CommandLineError, ConcurrencyError},
    layout,
    lock::BackupLock,
};

use crate::{backup_timestamp, create_user_data, quiet, relative_files, run_backup};

#[test]
fn test_first_backup_copies_everything() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;

    run_backup(&user_path, &backup_path, 0)?;

    let backups = layout::all_backups(&backup_path);
    assert_eq!(backups.len(), 1);
    assert_eq!(layout::backup_datetime(&backups[0])?, backup_timestamp(0));
    assert_eq!(relative_files(&backups[0]), relative_files(&user_path));

    for file in relative_files(&user_path) {
        assert_eq!(
            std::fs::read(user_path.join(&file))?,
            std::fs::read(backups[0].join(&file))?
        );
        #[cfg(unix)]
        assert_ne!(
            crate::inode(&user_path.join(&file)),
            crate::inode(&backups[0].join(&file))
        );
    }

    // The staging folder must not survive a successful run.
    assert!(!layout::staging_folder(&backup_path).exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_second_backup_is_fully_hard_linked() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;

    run_backup(&user_path, &backup_path, 0)?;
    run_backup(&user_path, &backup_path, 1)?;

    let backups = layout::all_backups(&backup_path);
    assert_eq!(backups.len(), 2);
    for file in relative_files(&backups[0]) {
        assert_eq!(
            crate::inode(&backups[0].join(&file)),
            crate::inode(&backups[1].join(&file))
        );
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_changed_file_is_copied_while_others_are_linked() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;

    run_backup(&user_path, &backup_path, 0)?;
    run_backup(&user_path, &backup_path, 1)?;

    let mut changed_file = OpenOptions::new()
        .append(true)
        .open(user_path.join("a/b/c.txt"))?;
    writeln!(changed_file, "x")?;
    drop(changed_file);

    run_backup(&user_path, &backup_path, 2)?;

    let backups = layout::all_backups(&backup_path);
    assert_eq!(backups.len(), 3);
    let changed = PathBuf::from("a/b/c.txt");
    for file in relative_files(&backups[1]) {
        let old_inode = crate::inode(&backups[1].join(&file));
        let new_inode = crate::inode(&backups[2].join(&file));
        if file == changed {
            assert_ne!(old_inode, new_inode);
        } else {
            assert_eq!(old_inode, new_inode);
        }
    }
    assert_eq!(
        std::fs::read(backups[2].join(&changed))?,
        std::fs::read(user_path.join(&changed))?
    );
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_force_copy_shares_no_inodes() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;

    run_backup(&user_path, &backup_path, 0)?;
    create_new_backup(
        &user_path,
        &backup_path,
        &BackupOptions {
            force_copy: true,
            timestamp: Some(backup_timestamp(1)),
            ..BackupOptions::default()
        },
    )?;

    let backups = layout::all_backups(&backup_path);
    for file in relative_files(&backups[0]) {
        assert_ne!(
            crate::inode(&backups[0].join(&file)),
            crate::inode(&backups[1].join(&file))
        );
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_copy_probability_one_shares_no_inodes() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;

    run_backup(&user_path, &backup_path, 0)?;
    create_new_backup(
        &user_path,
        &backup_path,
        &BackupOptions {
            copy_probability: 1.0,
            timestamp: Some(backup_timestamp(1)),
            ..BackupOptions::default()
        },
    )?;

    let backups = layout::all_backups(&backup_path);
    for file in relative_files(&backups[0]) {
        assert_ne!(
            crate::inode(&backups[0].join(&file)),
            crate::inode(&backups[1].join(&file))
        );
    }
    Ok(())
}

#[test]
fn test_filter_excludes_subtree_and_its_folders() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    std::fs::create_dir_all(user_path.join("a"))?;
    std::fs::create_dir_all(user_path.join("b"))?;
    std::fs::write(user_path.join("a/f.txt"), b"excluded")?;
    std::fs::write(user_path.join("b/g.txt"), b"included")?;
    std::fs::create_dir(&backup_path)?;

    let filter_file = temp_dir.path().join("filter.txt");
    std::fs::write(&filter_file, "- a/**\n")?;

    create_new_backup(
        &user_path,
        &backup_path,
        &BackupOptions {
            filter_file: Some(&filter_file),
            timestamp: Some(backup_timestamp(0)),
            ..BackupOptions::default()
        },
    )?;

    let backups = layout::all_backups(&backup_path);
    assert_eq!(backups.len(), 1);
    assert_eq!(relative_files(&backups[0]), vec![PathBuf::from("b/g.txt")]);
    assert!(!backups[0].join("a").exists());
    Ok(())
}

#[test]
fn test_zero_surviving_files_publishes_nothing() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    std::fs::create_dir_all(user_path.join("only/empty/folders"))?;
    std::fs::create_dir(&backup_path)?;

    run_backup(&user_path, &backup_path, 0)?;

    assert!(layout::all_backups(&backup_path).is_empty());
    assert!(!layout::staging_folder(&backup_path).exists());
    Ok(())
}

#[test]
fn test_leftover_staging_folder_is_removed() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;

    let staging = layout::staging_folder(&backup_path);
    std::fs::create_dir_all(staging.join("half-finished"))?;
    std::fs::write(staging.join("half-finished/file.txt"), b"leftover")?;

    run_backup(&user_path, &backup_path, 0)?;

    let backups = layout::all_backups(&backup_path);
    assert_eq!(backups.len(), 1);
    assert!(!backups[0].join("half-finished").exists());
    assert!(!staging.exists());
    Ok(())
}

#[test]
fn test_changed_source_location_is_rejected() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let first_user = temp_dir.path().join("first");
    let second_user = temp_dir.path().join("second");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&first_user)?;
    create_user_data(&second_user)?;
    std::fs::create_dir(&backup_path)?;

    run_backup(&first_user, &backup_path, 0)?;
    let error = run_backup(&second_user, &backup_path, 1).unwrap_err();
    assert!(error.downcast_ref::<CommandLineError>().is_some());
    assert_eq!(layout::all_backups(&backup_path).len(), 1);
    Ok(())
}

#[test]
fn test_backup_location_inside_source_is_rejected() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    create_user_data(&user_path)?;

    let error = run_backup(&user_path, &user_path.join("backups"), 0).unwrap_err();
    assert!(error.downcast_ref::<CommandLineError>().is_some());
    Ok(())
}

#[test]
fn test_locked_location_reports_the_other_operation() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let backup_path = temp_dir.path().join("backup");
    std::fs::create_dir(&backup_path)?;

    let _held = BackupLock::acquire(&backup_path, "backup")?;
    let error = BackupLock::acquire(&backup_path, "purge").unwrap_err();
    let busy = error.downcast_ref::<ConcurrencyError>().unwrap();
    assert_eq!(busy.operation, "backup");
    Ok(())
}

#[test]
fn test_start_backup_from_command_line_options() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;

    // The backup folder does not exist yet; the backup action creates it.
    let args = Cli {
        user_folder: Some(user_path.to_string_lossy().into_owned()),
        backup_folder: Some(backup_path.to_string_lossy().into_owned()),
        timestamp: Some(
            backup_timestamp(0)
                .format(layout::BACKUP_DATE_FORMAT)
                .to_string(),
        ),
        ..Cli::default()
    };
    archiver::start_backup(&args)?;

    let backups = layout::all_backups(&backup_path);
    assert_eq!(backups.len(), 1);
    assert_eq!(relative_files(&backups[0]), relative_files(&user_path));
    // The lock is released and the source is recorded.
    assert!(!backup_path.join("vintagebackup.lock").exists());
    assert_eq!(layout::backup_source(&backup_path)?, user_path);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_backed_up_as_symlinks() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::os::unix::fs::symlink("root.txt", user_path.join("link"))?;
    std::fs::create_dir(&backup_path)?;

    run_backup(&user_path, &backup_path, 0)?;
    run_backup(&user_path, &backup_path, 1)?;

    let backups = layout::all_backups(&backup_path);
    for backup in &backups {
        let link = backup.join("link");
        assert!(link.symlink_metadata()?.file_type().is_symlink());
        assert_eq!(std::fs::read_link(&link)?, PathBuf::from("root.txt"));
    }

    // Symlinks are copied anew every run, never hard-linked.
    assert_ne!(
        crate::inode(&backups[0].join("link")),
        crate::inode(&backups[1].join("link"))
    );
    Ok(())
}
