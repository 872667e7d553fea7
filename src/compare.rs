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

//! Deciding whether files changed since the previous backup.
//!
//! Shallow comparison inspects size, file kind, and modification time only.
//! Deep comparison reads both files and compares their bytes. Any failure to
//! stat or read a file classifies it as an error, which sends it to the copy
//! list.

use std::{
    collections::HashMap,
    fs::Metadata,
    io::{BufRead, BufReader},
    path::Path,
};

use filetime::FileTime;

fn shallow_signature(metadata: &Metadata) -> (u64, bool, bool, bool, FileTime) {
    let file_type = metadata.file_type();
    (
        metadata.len(),
        file_type.is_file(),
        file_type.is_dir(),
        file_type.is_symlink(),
        FileTime::from_last_modification_time(metadata),
    )
}

fn scan_directory(directory: &Path) -> std::io::Result<HashMap<String, Metadata>> {
    let mut stats = HashMap::new();
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        stats.insert(
            entry.file_name().to_string_lossy().into_owned(),
            entry.metadata()?,
        );
    }
    Ok(stats)
}

/// Decide which files match the previous backup based on quick stat
/// information. Returns matching, mismatching, and erroring file names.
pub fn shallow_comparison(
    user_directory: &Path,
    backup_directory: &Path,
    file_names: &[String],
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let Ok(backup_files) = scan_directory(backup_directory) else {
        return (Vec::new(), Vec::new(), file_names.to_vec());
    };
    let Ok(user_files) = scan_directory(user_directory) else {
        return (Vec::new(), Vec::new(), file_names.to_vec());
    };

    let mut matches = Vec::new();
    let mut mismatches = Vec::new();
    let mut errors = Vec::new();
    for file_name in file_names {
        match (user_files.get(file_name), backup_files.get(file_name)) {
            (Some(user_metadata), Some(backup_metadata)) => {
                if shallow_signature(user_metadata) == shallow_signature(backup_metadata) {
                    matches.push(file_name.clone());
                } else {
                    mismatches.push(file_name.clone());
                }
            }
            _ => errors.push(file_name.clone()),
        }
    }
    (matches, mismatches, errors)
}

/// Inspect file contents to determine if files match the most recent backup.
pub fn deep_comparison(
    user_directory: &Path,
    backup_directory: &Path,
    file_names: &[String],
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut matches = Vec::new();
    let mut mismatches = Vec::new();
    let mut errors = Vec::new();
    for file_name in file_names {
        match contents_match(&user_directory.join(file_name), &backup_directory.join(file_name)) {
            Ok(true) => matches.push(file_name.clone()),
            Ok(false) => mismatches.push(file_name.clone()),
            Err(_) => errors.push(file_name.clone()),
        }
    }
    (matches, mismatches, errors)
}

fn contents_match(first: &Path, second: &Path) -> std::io::Result<bool> {
    let first_metadata = first.symlink_metadata()?;
    let second_metadata = second.symlink_metadata()?;
    if first_metadata.len() != second_metadata.len() {
        return Ok(false);
    }

    let mut first_reader = BufReader::new(std::fs::File::open(first)?);
    let mut second_reader = BufReader::new(std::fs::File::open(second)?);
    loop {
        let first_chunk = first_reader.fill_buf()?;
        let second_chunk = second_reader.fill_buf()?;
        if first_chunk.is_empty() && second_chunk.is_empty() {
            return Ok(true);
        }

        let common_length = first_chunk.len().min(second_chunk.len());
        if common_length == 0 {
            return Ok(false);
        }
        if first_chunk[..common_length] != second_chunk[..common_length] {
            return Ok(false);
        }
        first_reader.consume(common_length);
        second_reader.consume(common_length);
    }
}

fn separate_links(directory: &Path, path_names: Vec<String>) -> (Vec<String>, Vec<String>) {
    path_names.into_iter().partition(|name| {
        !directory
            .join(name)
            .symlink_metadata()
            .map(|metadata| metadata.file_type().is_symlink())
            .unwrap_or(false)
    })
}

/// Sort a list of files according to whether they will be hard-linked or
/// copied.
///
/// Returns the names to hard-link and the names to copy, in that order. Files
/// are copied when they are new, changed, or unreadable, when there is no
/// previous backup, when they are symbolic links, or when the random coin
/// with the given probability chooses them despite a match.
pub fn compare_to_backup(
    user_directory: &Path,
    backup_directory: Option<&Path>,
    file_names: Vec<String>,
    examine_whole_file: bool,
    copy_probability: f64,
) -> (Vec<String>, Vec<String>) {
    let Some(backup_directory) = backup_directory else {
        return (Vec::new(), file_names);
    };

    let (file_names, links) = separate_links(user_directory, file_names);
    let (matches, mismatches, errors) = if examine_whole_file {
        deep_comparison(user_directory, backup_directory, &file_names)
    } else {
        shallow_comparison(user_directory, backup_directory, &file_names)
    };

    let (random_copies, matches): (Vec<String>, Vec<String>) = matches
        .into_iter()
        .partition(|_| copy_probability > 0.0 && rand::random::<f64>() < copy_probability);

    let mut to_copy = mismatches;
    to_copy.extend(errors);
    to_copy.extend(random_copies);
    to_copy.extend(links);
    (matches, to_copy)
}
