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

//! A lock that keeps other instances away from a backup location.
//!
//! The lock is an exclusively created file holding the process ID and the
//! name of the running operation. A process killed without unwinding leaves
//! the file behind; the user resolves that by deleting it manually.

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};

use crate::{errors::ConcurrencyError, ui::cli};

const LOCK_FILE_NAME: &str = "vintagebackup.lock";

/// Exclusive possession of a backup location, released on drop.
#[derive(Debug)]
pub struct BackupLock {
    lock_file_path: PathBuf,
}

impl BackupLock {
    /// Attempt to take possession of the backup location.
    ///
    /// Fails with [`ConcurrencyError`] naming the other process when the
    /// location is already locked.
    pub fn acquire(backup_location: &Path, operation: &str) -> Result<Self> {
        let lock_file_path = backup_location.join(LOCK_FILE_NAME);
        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_file_path)
            {
                Ok(mut lock_file) => {
                    writeln!(lock_file, "{}", std::process::id()).with_context(|| {
                        format!("Could not write lock file '{}'", lock_file_path.display())
                    })?;
                    writeln!(lock_file, "{operation}").with_context(|| {
                        format!("Could not write lock file '{}'", lock_file_path.display())
                    })?;
                    return Ok(Self { lock_file_path });
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                    let contents = match std::fs::read_to_string(&lock_file_path) {
                        Ok(contents) => contents,
                        // The holder released the lock between the failed
                        // creation and the read. Try again.
                        Err(read_error) if read_error.kind() == ErrorKind::NotFound => continue,
                        Err(read_error) => {
                            return Err(read_error).with_context(|| {
                                format!(
                                    "Could not read lock file '{}'",
                                    lock_file_path.display()
                                )
                            });
                        }
                    };

                    let mut lines = contents.lines();
                    let pid = lines.next().unwrap_or_default().trim().to_string();
                    let other_operation = lines.next().unwrap_or_default().trim().to_string();
                    bail!(ConcurrencyError {
                        pid,
                        operation: other_operation,
                        location: backup_location.to_path_buf(),
                    });
                }
                Err(error) => {
                    return Err(error).with_context(|| {
                        format!("Could not create lock file '{}'", lock_file_path.display())
                    });
                }
            }
        }
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.lock_file_path) {
            cli::error!(
                "Could not release lock file '{}': {error}",
                self.lock_file_path.display()
            );
        }
    }
}
