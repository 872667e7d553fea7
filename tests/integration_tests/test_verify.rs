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

use vintagebackup::verify;

use crate::{create_user_data, quiet, run_backup};

#[test]
fn test_verification_sorts_files_into_three_reports() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let user_path = temp_dir.path().join("user");
    let backup_path = temp_dir.path().join("backup");
    let result_path = temp_dir.path().join("results");
    create_user_data(&user_path)?;
    std::fs::create_dir(&backup_path)?;
    run_backup(&user_path, &backup_path, 0)?;

    verify::verify_last_backup(&result_path, &backup_path, None)?;

    let header = format!(
        "Comparison: {} <---> {}\n",
        user_path.display(),
        backup_path.display()
    );
    let matching = std::fs::read_to_string(result_path.join("matching files.txt"))?;
    let mismatching = std::fs::read_to_string(result_path.join("mismatching files.txt"))?;
    let errors = std::fs::read_to_string(result_path.join("error files.txt"))?;

    assert!(matching.starts_with(&header));
    assert!(matching.contains("root.txt"));
    assert!(matching.contains("c.txt"));
    assert_eq!(mismatching, header);
    assert_eq!(errors, header);

    // A changed and a new file land in the other two reports on the next
    // run, which must not overwrite the first reports.
    std::fs::write(user_path.join("root.txt"), b"changed after backup")?;
    std::fs::write(user_path.join("brand_new.txt"), b"never backed up")?;
    verify::verify_last_backup(&result_path, &backup_path, None)?;

    let mismatching = std::fs::read_to_string(result_path.join("mismatching files.1.txt"))?;
    let errors = std::fs::read_to_string(result_path.join("error files.1.txt"))?;
    assert!(mismatching.contains("root.txt"));
    assert!(errors.contains("brand_new.txt"));
    Ok(())
}

#[test]
fn test_verification_without_backups_is_rejected() -> Result<()> {
    quiet();
    let temp_dir = tempdir()?;
    let backup_path = temp_dir.path().join("backup");
    let result_path = temp_dir.path().join("results");
    std::fs::create_dir(&backup_path)?;

    assert!(verify::verify_last_backup(&result_path, &backup_path, None).is_err());
    Ok(())
}
