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

use std::io::Write;

use anyhow::Result;
use tempfile::tempdir;

use vintagebackup::{layout, mover};

use crate::{create_user_data, quiet, relative_files, run_backup};

#[test]
fn test_move_recreates_backups_and_link_sharing() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let old_location = temp_dir.path().join("old");
    let new_location = temp_dir.path().join("new");
    create_user_data(&user_path)?;
    std::fs::create_dir(&old_location)?;
    std::fs::create_dir(&new_location)?;

    for n in 0..5 {
        if n == 3 {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(user_path.join("root.txt"))?;
            writeln!(file, "more")?;
        }
        run_backup(&user_path, &old_location, n)?;
    }

    let old_backups = layout::all_backups(&old_location);
    assert_eq!(old_backups.len(), 5);

    let backups_to_move = mover::last_n_backups("all", &old_location)?;
    mover::move_backups(&old_location, &new_location, &backups_to_move)?;

    let new_backups = layout::all_backups(&new_location);
    assert_eq!(new_backups.len(), 5);

    for (old_backup, new_backup) in old_backups.iter().zip(&new_backups) {
        // Same relative names and identical contents.
        assert_eq!(
            old_backup.strip_prefix(&old_location)?,
            new_backup.strip_prefix(&new_location)?
        );
        assert_eq!(relative_files(old_backup), relative_files(new_backup));
        for file in relative_files(old_backup) {
            assert_eq!(
                std::fs::read(old_backup.join(&file))?,
                std::fs::read(new_backup.join(&file))?
            );
        }
    }

    // Hard-link sharing between consecutive backups is rebuilt at the new
    // location.
    #[cfg(unix)]
    for pair in new_backups.windows(2) {
        for file in relative_files(&pair[0]) {
            let before = crate::inode(&pair[0].join(&file));
            let after = crate::inode(&pair[1].join(&file));
            let unchanged =
                std::fs::read(pair[0].join(&file))? == std::fs::read(pair[1].join(&file))?;
            if unchanged {
                assert_eq!(before, after, "{} should stay linked", file.display());
            } else {
                assert_ne!(before, after, "{} should be a new copy", file.display());
            }
        }
    }

    // The new location records the original source, and the old backups are
    // left in place.
    assert_eq!(
        layout::backup_source(&new_location)?,
        layout::backup_source(&old_location)?
    );
    assert_eq!(layout::all_backups(&old_location).len(), 5);
    Ok(())
}

#[test]
fn test_move_selection_by_count() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let old_location = temp_dir.path().join("old");
    let new_location = temp_dir.path().join("new");
    create_user_data(&user_path)?;
    std::fs::create_dir(&old_location)?;
    std::fs::create_dir(&new_location)?;

    for n in 0..4 {
        run_backup(&user_path, &old_location, n)?;
    }

    let backups_to_move = mover::last_n_backups("2", &old_location)?;
    mover::move_backups(&old_location, &new_location, &backups_to_move)?;

    let old_names: Vec<_> = layout::all_backups(&old_location)
        .iter()
        .map(|backup| backup.file_name().unwrap().to_owned())
        .collect();
    let new_names: Vec<_> = layout::all_backups(&new_location)
        .iter()
        .map(|backup| backup.file_name().unwrap().to_owned())
        .collect();
    assert_eq!(new_names, old_names[2..].to_vec());
    Ok(())
}
