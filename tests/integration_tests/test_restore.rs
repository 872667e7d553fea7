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

use anyhow::Result;
use tempfile::tempdir;

use vintagebackup::{layout, restore};

use crate::{create_user_data, quiet, relative_files, run_backup};

#[test]
fn test_restore_with_delete_extra_recreates_the_backup_exactly() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;
    run_backup(&user_path, &backup_path, 0)?;

    // Diverge from the backed up state.
    std::fs::write(user_path.join("extra.txt"), b"not backed up")?;
    std::fs::create_dir(user_path.join("extra_folder"))?;
    std::fs::write(user_path.join("extra_folder/another.txt"), b"also new")?;
    std::fs::write(user_path.join("root.txt"), b"overwritten")?;

    let backup = layout::find_previous_backup(&backup_path).unwrap();
    restore::restore_backup(&backup, &user_path, true)?;

    assert_eq!(relative_files(&user_path), relative_files(&backup));
    for file in relative_files(&backup) {
        assert_eq!(
            std::fs::read(user_path.join(&file))?,
            std::fs::read(backup.join(&file))?
        );
    }
    assert!(!user_path.join("extra.txt").exists());
    assert!(!user_path.join("extra_folder").exists());
    assert_eq!(std::fs::read(user_path.join("root.txt"))?, b"root file");
    Ok(())
}

#[test]
fn test_restore_with_keep_extra_preserves_new_files() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;
    run_backup(&user_path, &backup_path, 0)?;

    std::fs::write(user_path.join("extra.txt"), b"not backed up")?;
    std::fs::write(user_path.join("root.txt"), b"overwritten")?;

    let backup = layout::find_previous_backup(&backup_path).unwrap();
    restore::restore_backup(&backup, &user_path, false)?;

    assert_eq!(std::fs::read(user_path.join("extra.txt"))?, b"not backed up");
    assert_eq!(std::fs::read(user_path.join("root.txt"))?, b"root file");
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_restore_to_a_different_destination_copies_rather_than_links() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    let destination = temp_dir.path().join("elsewhere");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;
    run_backup(&user_path, &backup_path, 0)?;

    let backup = layout::find_previous_backup(&backup_path).unwrap();
    restore::restore_backup(&backup, &destination, false)?;

    assert_eq!(relative_files(&destination), relative_files(&backup));
    for file in relative_files(&backup) {
        assert_eq!(
            std::fs::read(destination.join(&file))?,
            std::fs::read(backup.join(&file))?
        );
        assert_ne!(
            crate::inode(&destination.join(&file)),
            crate::inode(&backup.join(&file))
        );
    }
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_restoring_over_a_hard_linked_file_does_not_corrupt_backups() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;
    run_backup(&user_path, &backup_path, 0)?;
    run_backup(&user_path, &backup_path, 1)?;

    let backups = layout::all_backups(&backup_path);

    // Hard-link a user file to the latest backup, as a user might after a
    // manual recovery, then change it and restore from the first backup.
    std::fs::remove_file(user_path.join("root.txt"))?;
    std::fs::hard_link(backups[1].join("root.txt"), user_path.join("root.txt"))?;
    restore::restore_backup(&backups[0], &user_path, false)?;

    assert_eq!(std::fs::read(user_path.join("root.txt"))?, b"root file");
    assert_eq!(std::fs::read(backups[1].join("root.txt"))?, b"root file");
    assert_ne!(
        crate::inode(&user_path.join("root.txt")),
        crate::inode(&backups[1].join("root.txt"))
    );
    Ok(())
}
