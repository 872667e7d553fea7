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

mod test_backup;
mod test_move;
mod test_restore;
mod test_retention;
mod test_verify;

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};

use vintagebackup::archiver::{BackupOptions, create_new_backup};

/// Quiet the console for the whole test binary. Log files are unaffected.
pub fn quiet() {
    vintagebackup::ui::cli::set_quiet(true);
}

/// A timestamp for the nth backup of a test run.
pub fn backup_timestamp(n: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 5, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(n as i64)
}

/// Create a small user directory with files at several depths.
pub fn create_user_data(user_path: &Path) -> Result<()> {
    std::fs::create_dir_all(user_path.join("a/b"))?;
    std::fs::create_dir_all(user_path.join("sub"))?;
    std::fs::write(user_path.join("root.txt"), b"root file")?;
    std::fs::write(user_path.join("a/b/c.txt"), b"deeply nested")?;
    std::fs::write(user_path.join("sub/data.txt"), b"some data")?;
    Ok(())
}

/// Run one backup with a fixed timestamp and no filtering.
pub fn run_backup(user_path: &Path, backup_path: &Path, n: u32) -> Result<u64> {
    create_new_backup(
        user_path,
        backup_path,
        &BackupOptions {
            timestamp: Some(backup_timestamp(n)),
            ..BackupOptions::default()
        },
    )
}

/// Every file in a backup tree as paths relative to its root, sorted.
pub fn relative_files(root: &Path) -> Vec<PathBuf> {
    fn walk(root: &Path, directory: &Path, files: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(directory) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.symlink_metadata().map(|m| m.is_dir()).unwrap_or(false) {
                walk(root, &path, files);
            } else {
                files.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }

    let mut files = Vec::new();
    walk(root, root, &mut files);
    files.sort();
    files
}

#[cfg(unix)]
pub fn inode(path: &Path) -> u64 {
    use std::os::unix::fs::MetadataExt;
    path.symlink_metadata().expect("path should exist").ino()
}
