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

//! The on-disk layout of a backup location.
//!
//! A backup location contains year folders (`YYYY`), each holding dated
//! backup folders named `YYYY-MM-DD HH-MM-SS`, plus an information file
//! recording the backed up source and the log file, a transient `Staging`
//! folder while a backup is being built, and a lock file while any operation
//! runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDateTime};

use crate::{errors::CommandLineError, utils};

pub const BACKUP_DATE_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

const INFO_FILE_NAME: &str = "vintagebackup.source.txt";
const STAGING_FOLDER_NAME: &str = "Staging";

/// The name and relative path (`YYYY/YYYY-MM-DD HH-MM-SS`) of a dated backup.
pub fn backup_name(timestamp: NaiveDateTime) -> PathBuf {
    PathBuf::from(timestamp.year().to_string())
        .join(timestamp.format(BACKUP_DATE_FORMAT).to_string())
}

/// The timestamp of a backup from the backup folder name.
pub fn backup_datetime(backup: &Path) -> Result<NaiveDateTime> {
    let name = backup
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    NaiveDateTime::parse_from_str(&name, BACKUP_DATE_FORMAT)
        .with_context(|| format!("Not a dated backup folder: {}", backup.display()))
}

fn is_year_name(name: &str) -> bool {
    name.len() == 4 && name.chars().all(|character| character.is_ascii_digit())
}

/// A sorted list of all dated backups at the given location.
///
/// Entries whose parent is not a valid year folder, whose name does not parse
/// as a backup timestamp, or whose year folder disagrees with their timestamp
/// are ignored.
pub fn all_backups(backup_location: &Path) -> Vec<PathBuf> {
    let mut dated_backups: Vec<(NaiveDateTime, PathBuf)> = Vec::new();
    let Ok(year_entries) = std::fs::read_dir(backup_location) else {
        return Vec::new();
    };

    for year_entry in year_entries.flatten() {
        let year_path = year_entry.path();
        let year_name = year_entry.file_name().to_string_lossy().into_owned();
        if !is_year_name(&year_name) || !utils::is_real_directory(&year_path) {
            continue;
        }
        let year: i32 = year_name.parse().unwrap_or_default();

        let Ok(entries) = std::fs::read_dir(&year_path) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !utils::is_real_directory(&path) {
                continue;
            }
            if let Ok(date) = backup_datetime(&path)
                && date.year() == year
            {
                dated_backups.push((date, path));
            }
        }
    }

    dated_backups.sort();
    dated_backups.into_iter().map(|(_, path)| path).collect()
}

/// The most recent backup at the given location, if any.
pub fn find_previous_backup(backup_location: &Path) -> Option<PathBuf> {
    all_backups(backup_location).pop()
}

/// The staging folder where new backups are built before publication.
pub fn staging_folder(backup_location: &Path) -> PathBuf {
    backup_location.join(STAGING_FOLDER_NAME)
}

/// The file recording the backed up source and the log file for a location.
pub fn backup_info_file(backup_location: &Path) -> PathBuf {
    backup_location.join(INFO_FILE_NAME)
}

/// Information about a backup location.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub source: Option<PathBuf>,
    pub log: Option<PathBuf>,
}

/// Read the information file of a backup location.
///
/// A missing file leaves both fields empty. A line with no key is read as the
/// source (the format of older versions). Unknown keys are an error.
pub fn read_backup_information(backup_location: &Path) -> Result<BackupInfo> {
    let info_file = backup_info_file(backup_location);
    let contents = match std::fs::read_to_string(&info_file) {
        Ok(contents) => contents,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(BackupInfo::default());
        }
        Err(error) => {
            return Err(error)
                .with_context(|| format!("Could not read '{}'", info_file.display()));
        }
    };

    let mut info = BackupInfo::default();
    for line_raw in contents.lines() {
        let line = line_raw.trim_start();
        if line.is_empty() {
            continue;
        }

        let (key, value) = if line.starts_with("Source") || line.starts_with("Log") {
            line.split_once(": ").ok_or_else(|| {
                anyhow!("Malformed line in {}: {line}", info_file.display())
            })?
        } else {
            ("Source", line)
        };

        match key.trim() {
            "Source" => info.source = Some(utils::absolute_path(Path::new(value))),
            "Log" => info.log = Some(utils::absolute_path(Path::new(value))),
            unknown => bail!("Unknown key in {}: {unknown}", info_file.display()),
        }
    }
    Ok(info)
}

/// Write the information file of a backup location. Only non-empty fields are
/// written.
pub fn write_backup_information(backup_location: &Path, info: &BackupInfo) -> Result<()> {
    let info_file = backup_info_file(backup_location);
    let mut contents = String::new();
    if let Some(source) = &info.source {
        contents.push_str(&format!("Source: {}\n", source.display()));
    }
    if let Some(log) = &info.log {
        contents.push_str(&format!("Log: {}\n", log.display()));
    }
    std::fs::write(&info_file, contents)
        .with_context(|| format!("Could not write '{}'", info_file.display()))
}

/// The source directory that was backed up to the given location.
pub fn backup_source(backup_location: &Path) -> Result<PathBuf> {
    read_backup_information(backup_location)?.source.ok_or_else(|| {
        anyhow!(
            "No source for backups in {} found.",
            backup_location.display()
        )
    })
}

/// Record the source directory being backed up to the given location.
pub fn record_user_location(user_location: &Path, backup_location: &Path) -> Result<()> {
    let mut info = read_backup_information(backup_location)?;
    info.source = Some(utils::absolute_path(user_location));
    write_backup_information(backup_location, &info)
}

/// Make sure the source being backed up matches the one backed up previously.
///
/// Backing up a different directory to the same location would defeat the
/// hard linking between consecutive backups.
pub fn confirm_user_location_is_unchanged(
    user_data_location: &Path,
    backup_location: &Path,
) -> Result<()> {
    let info = read_backup_information(backup_location)?;
    if let Some(recorded) = info.source
        && !utils::same_file(&recorded, user_data_location)
    {
        bail!(CommandLineError(format!(
            "Previous backup stored a different user folder. Previously: {}; Now: {}",
            recorded.display(),
            utils::absolute_path(user_data_location).display()
        )));
    }
    Ok(())
}

/// The log file used for previous operations on a backup location.
pub fn backup_log_file(backup_location: &Path) -> Option<PathBuf> {
    read_backup_information(backup_location).ok()?.log
}

/// Record the log file used with a backup location.
pub fn record_backup_log_file(log_file_path: &Path, backup_location: &Path) -> Result<()> {
    let mut info = read_backup_information(backup_location)?;
    info.log = Some(utils::absolute_path(log_file_path));
    write_backup_information(backup_location, &info)
}

/// The log file in the user's home folder used when no other is specified.
pub fn default_log_file() -> PathBuf {
    std::env::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vintagebackup.log")
}

/// Decide which file to use for logging.
pub fn primary_log_path(log_file_name: Option<&str>, backup_folder: Option<&str>) -> Option<PathBuf> {
    let devnull = if cfg!(windows) { "NUL" } else { "/dev/null" };
    if let Some(log_file_name) = log_file_name {
        if log_file_name == devnull {
            None
        } else {
            Some(utils::absolute_path(Path::new(log_file_name)))
        }
    } else if let Some(backup_folder) = backup_folder {
        let backup_path = utils::absolute_path(Path::new(backup_folder));
        backup_log_file(&backup_path).or_else(|| Some(default_log_file()))
    } else {
        None
    }
}
