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

//! Small helpers for working with paths, storage sizes, and the filesystem.

use std::{
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use filetime::FileTime;

use crate::{errors::CommandLineError, ui::cli};

pub const STORAGE_PREFIXES: [&str; 11] = ["", "k", "M", "G", "T", "P", "E", "Z", "Y", "R", "Q"];

/// Display a number of bytes with four significant figures and byte units.
pub fn byte_units(size: f64) -> Result<String> {
    if size < 0.0 {
        bail!("Got invalid value for byte_units(): {size}");
    }

    if size < 1.0 {
        return Ok("0.000 B".to_string());
    }

    let prefix_step: f64 = 1000.0;
    let index = ((size.log10() / prefix_step.log10()) as usize).min(STORAGE_PREFIXES.len() - 1);
    let size_in_units = size / prefix_step.powi(index as i32);
    let decimal_digits = (4 - (size_in_units.log10().floor() as i64 + 1)).max(0) as usize;
    Ok(format!(
        "{size_in_units:.decimal_digits$} {}B",
        STORAGE_PREFIXES[index]
    ))
}

/// Parse a string like "152 kB" or "123gb" into a number of bytes.
///
/// Units are case and spacing insensitive and use SI prefixes with steps of
/// 1000.
pub fn parse_storage_space(space_requirement: &str) -> Result<f64> {
    let invalid =
        || CommandLineError(format!("Invalid storage space value: {space_requirement}"));

    let text: String = space_requirement.split_whitespace().collect::<String>().to_uppercase();
    let text = text.replace('K', "k");
    let text = text.trim_end_matches('B');
    if text.is_empty() {
        bail!(invalid());
    }

    let (number, prefix) = match text.chars().last() {
        Some(last) if last.is_alphabetic() => text.split_at(text.len() - last.len_utf8()),
        _ => (text, ""),
    };
    let index = STORAGE_PREFIXES
        .iter()
        .position(|p| *p == prefix)
        .ok_or_else(invalid)?;
    let number: f64 = number.parse().map_err(|_| invalid())?;
    Ok(number * 1000f64.powi(index as i32))
}

/// Normalize a path to an absolute form without resolving symlinks.
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Whether something exists at the path. Symlinks are not followed.
pub fn exists_without_following(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Whether the path is a directory and not a symlink to one.
pub fn is_real_directory(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

/// Whether the path is a Windows junction point. Always false elsewhere.
#[cfg(windows)]
pub fn is_junction(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
    match path.symlink_metadata() {
        Ok(metadata) => {
            metadata.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0
                && !metadata.file_type().is_symlink()
        }
        Err(_) => false,
    }
}

#[cfg(not(windows))]
pub fn is_junction(_path: &Path) -> bool {
    false
}

/// Create a unique name for a path if something already exists at that path.
///
/// A number is inserted between the name and suffix (if any) so that nothing
/// existing is clobbered.
pub fn unique_path_name(destination_path: &Path) -> PathBuf {
    let mut unique_path = destination_path.to_path_buf();
    let mut unique_id = 0;
    while exists_without_following(&unique_path) {
        unique_id += 1;
        let stem = destination_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = destination_path
            .extension()
            .map(|extension| format!(".{}", extension.to_string_lossy()))
            .unwrap_or_default();
        unique_path = destination_path.with_file_name(format!("{stem}.{unique_id}{suffix}"));
    }
    unique_path
}

/// A text description of the item at a path. Symlinks are not followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathKind {
    File,
    Folder,
    Symlink,
    Unknown,
}

impl fmt::Display for PathKind {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PathKind::File => "File",
            PathKind::Folder => "Folder",
            PathKind::Symlink => "Symlink",
            PathKind::Unknown => "Unknown",
        };
        write!(formatter, "{name}")
    }
}

pub fn classify_path(path: &Path) -> PathKind {
    match path.symlink_metadata() {
        Ok(metadata) if metadata.file_type().is_symlink() => PathKind::Symlink,
        Ok(metadata) if metadata.is_dir() => PathKind::Folder,
        Ok(metadata) if metadata.is_file() => PathKind::File,
        _ => PathKind::Unknown,
    }
}

fn make_writable(path: &Path) -> io::Result<()> {
    let metadata = path.symlink_metadata()?;
    let mut permissions = metadata.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    std::fs::set_permissions(path, permissions)
}

/// Delete a file. Read-only files have the write bit set and deletion retried.
pub fn delete_file(file_path: &Path, ignore_errors: bool) -> Result<()> {
    if std::fs::remove_file(file_path).is_ok() {
        return Ok(());
    }

    let result = make_writable(file_path).and_then(|()| std::fs::remove_file(file_path));
    match result {
        Ok(()) => Ok(()),
        Err(error) if ignore_errors => {
            cli::error!("Could not delete {}: {error}", file_path.display());
            Ok(())
        }
        Err(error) => Err(error)
            .with_context(|| format!("Could not delete {}", file_path.display())),
    }
}

/// Delete a directory and everything beneath it.
///
/// With `ignore_errors`, items that cannot be deleted are reported and
/// skipped; otherwise the first failure aborts the deletion.
pub fn delete_directory_tree(directory: &Path, ignore_errors: bool) -> Result<()> {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) if ignore_errors => {
            cli::error!("Could not delete {}: {error}", directory.display());
            return Ok(());
        }
        Err(error) => {
            return Err(error)
                .with_context(|| format!("Could not list {}", directory.display()));
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_directory = entry
            .file_type()
            .map(|file_type| file_type.is_dir())
            .unwrap_or(false);
        if is_directory {
            delete_directory_tree(&path, ignore_errors)?;
        } else {
            delete_file(&path, ignore_errors)?;
        }
    }

    if std::fs::remove_dir(directory).is_ok() {
        return Ok(());
    }

    let result = make_writable(directory).and_then(|()| std::fs::remove_dir(directory));
    match result {
        Ok(()) => Ok(()),
        Err(error) if ignore_errors => {
            cli::error!("Could not delete {}: {error}", directory.display());
            Ok(())
        }
        Err(error) => Err(error)
            .with_context(|| format!("Could not delete {}", directory.display())),
    }
}

/// Delete a path whether it is a file, folder, or something else.
pub fn delete_path(path: &Path, ignore_errors: bool) -> Result<()> {
    if is_real_directory(path) {
        delete_directory_tree(path, ignore_errors)
    } else {
        delete_file(path, ignore_errors)
    }
}

/// Copy a single file or symlink, preserving modification times and never
/// following symlinks. Returns the number of bytes copied.
pub fn copy_file_with_metadata(source: &Path, destination: &Path) -> Result<u64> {
    let metadata = source
        .symlink_metadata()
        .with_context(|| format!("Could not read '{}'", source.display()))?;

    if metadata.file_type().is_symlink() {
        let target = std::fs::read_link(source)
            .with_context(|| format!("Could not read symlink '{}'", source.display()))?;
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, destination).with_context(|| {
            format!("Could not create symlink '{}'", destination.display())
        })?;
        #[cfg(windows)]
        {
            // Windows distinguishes symlinks to files and symlinks to dirs.
            let links_to_directory = source
                .metadata()
                .map(|target_metadata| target_metadata.is_dir())
                .unwrap_or(false);
            if links_to_directory {
                std::os::windows::fs::symlink_dir(&target, destination)
            } else {
                std::os::windows::fs::symlink_file(&target, destination)
            }
            .with_context(|| {
                format!("Could not create symlink '{}'", destination.display())
            })?;
        }
        let _ = filetime::set_symlink_file_times(
            destination,
            FileTime::from_last_access_time(&metadata),
            FileTime::from_last_modification_time(&metadata),
        );
        return Ok(metadata.len());
    }

    std::fs::copy(source, destination).with_context(|| {
        format!(
            "Could not copy '{}' to '{}'",
            source.display(),
            destination.display()
        )
    })?;
    let modified_time = FileTime::from_last_modification_time(&metadata);
    let accessed_time = FileTime::from_last_access_time(&metadata);
    filetime::set_file_times(destination, accessed_time, modified_time)
        .with_context(|| format!("Could not set file times for '{}'", destination.display()))?;
    Ok(metadata.len())
}

/// Recursively copy a directory, preserving symlinks and file times.
pub fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    std::fs::create_dir_all(destination)
        .with_context(|| format!("Could not create '{}'", destination.display()))?;
    for entry in std::fs::read_dir(source)
        .with_context(|| format!("Could not list '{}'", source.display()))?
    {
        let entry = entry?;
        let source_path = entry.path();
        let destination_path = destination.join(entry.file_name());
        if is_real_directory(&source_path) {
            copy_tree(&source_path, &destination_path)?;
        } else {
            copy_file_with_metadata(&source_path, &destination_path)?;
        }
    }
    Ok(())
}

/// Return the absolute version of a path argument that must already exist.
pub fn get_existing_path(path: Option<&str>, folder_type: &str) -> Result<PathBuf> {
    let Some(path) = path else {
        bail!(CommandLineError(format!(
            "{} not specified.",
            capitalize(folder_type)
        )));
    };

    let abs_path = absolute_path(Path::new(path));
    if !exists_without_following(&abs_path) {
        bail!(CommandLineError(format!(
            "Could not find {}: {path}",
            folder_type.to_lowercase()
        )));
    }
    Ok(abs_path)
}

pub fn capitalize(text: &str) -> String {
    let mut characters = text.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().collect::<String>() + characters.as_str(),
        None => String::new(),
    }
}

/// Write the full path of a directory followed by a list of files it contains.
pub fn write_directory(
    output: &mut dyn Write,
    directory: &Path,
    file_names: &[String],
) -> io::Result<()> {
    if file_names.is_empty() {
        return Ok(());
    }

    writeln!(output, "{}{}", directory.display(), std::path::MAIN_SEPARATOR)?;
    for name in file_names {
        writeln!(output, "    {name}")?;
    }
    Ok(())
}

/// Whether two paths refer to the same existing file or folder.
pub fn same_file(first: &Path, second: &Path) -> bool {
    match (std::fs::canonicalize(first), std::fs::canonicalize(second)) {
        (Ok(first), Ok(second)) => first == second,
        _ => false,
    }
}

pub struct DiskUsage {
    pub total: u64,
    pub free: u64,
}

/// Total and available storage space of the filesystem holding `path`.
#[cfg(unix)]
pub fn disk_usage(path: &Path) -> Result<DiskUsage> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("Invalid path: {}", path.display()))?;
    let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) };
    if result != 0 {
        return Err(io::Error::last_os_error())
            .with_context(|| format!("Could not read storage space of {}", path.display()));
    }

    let fragment_size = stats.f_frsize as u64;
    Ok(DiskUsage {
        total: stats.f_blocks as u64 * fragment_size,
        free: stats.f_bavail as u64 * fragment_size,
    })
}

#[cfg(windows)]
pub fn disk_usage(path: &Path) -> Result<DiskUsage> {
    use std::os::windows::ffi::OsStrExt;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn GetDiskFreeSpaceExW(
            directory_name: *const u16,
            free_bytes_available: *mut u64,
            total_number_of_bytes: *mut u64,
            total_number_of_free_bytes: *mut u64,
        ) -> i32;
    }

    let wide_path: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let mut available = 0u64;
    let mut total = 0u64;
    let mut free = 0u64;
    let result = unsafe {
        GetDiskFreeSpaceExW(wide_path.as_ptr(), &mut available, &mut total, &mut free)
    };
    if result == 0 {
        return Err(io::Error::last_os_error())
            .with_context(|| format!("Could not read storage space of {}", path.display()));
    }

    Ok(DiskUsage {
        total,
        free: available,
    })
}
