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

//! Console and log file output.
//!
//! Every message goes through [`emit`]: the console shows it immediately while
//! the primary log file (and the error log, for warnings and errors) receives
//! a timestamped copy. Scheduled runs are usually read back through the log,
//! so anything worth showing the user is worth logging.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static QUIET: AtomicBool = AtomicBool::new(false);
static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
static ERROR_LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

/// Enable debug-level messages.
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Suppress console output. Log files still receive all messages.
pub fn set_quiet(enabled: bool) {
    QUIET.store(enabled, Ordering::Relaxed);
}

/// Append all messages to the given file.
pub fn open_log_file(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open log file '{}'", path.display()))?;
    *LOG_FILE.lock() = Some(file);
    Ok(())
}

/// Append warnings and errors to the given file.
pub fn open_error_log_file(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open error log file '{}'", path.display()))?;
    *ERROR_LOG_FILE.lock() = Some(file);
    Ok(())
}

/// Stop writing to the log files.
pub fn close_log_files() {
    *LOG_FILE.lock() = None;
    *ERROR_LOG_FILE.lock() = None;
}

pub fn emit(level: Level, args: std::fmt::Arguments) {
    if level == Level::Debug && !DEBUG_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let message = args.to_string();
    if !QUIET.load(Ordering::Relaxed) {
        match level {
            Level::Debug => println!("{} {message}", "debug:".dimmed()),
            Level::Info => println!("{message}"),
            Level::Warning => eprintln!("{} {message}", "warning:".bold().yellow()),
            Level::Error => eprintln!("{} {message}", "error:".bold().red()),
        }
    }

    let tag = match level {
        Level::Debug => "DEBUG",
        Level::Info => "INFO",
        Level::Warning => "WARNING",
        Level::Error => "ERROR",
    };
    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    if let Some(file) = LOG_FILE.lock().as_mut() {
        let _ = writeln!(file, "{stamp} {tag:<7} {message}");
    }
    if level >= Level::Warning
        && let Some(file) = ERROR_LOG_FILE.lock().as_mut()
    {
        let _ = writeln!(file, "{stamp} {tag:<7} {message}");
    }
}

#[macro_export]
macro_rules! log {
    () => {
        $crate::ui::cli::emit($crate::ui::cli::Level::Info, format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::ui::cli::emit($crate::ui::cli::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        $crate::ui::cli::emit($crate::ui::cli::Level::Warning, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::ui::cli::emit($crate::ui::cli::Level::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::ui::cli::emit($crate::ui::cli::Level::Debug, format_args!($($arg)*))
    };
}

pub use {debug, error, log, warning};

/// Describe the key combination that emits a SIGINT.
pub fn cancel_key() -> &'static str {
    if cfg!(target_os = "macos") { "Cmd-C" } else { "Ctrl-C" }
}

/// Convert a noun to a simple plural phrase if the count is not one.
pub fn plural_noun(count: usize, word: &str) -> String {
    format!("{count} {word}{}", if count == 1 { "" } else { "s" })
}

/// Announce the action taking place.
pub fn print_run_title(title: &str, config_file: Option<&str>) {
    log!();
    let divider = "=".repeat(title.len() + 2);
    log!("{divider}");
    log!(" {title}");
    log!("{divider}");
    log!();

    if let Some(config_file) = config_file {
        log!(
            "Reading configuration from file: {}",
            crate::utils::absolute_path(Path::new(config_file)).display()
        );
        log!();
    }
}
