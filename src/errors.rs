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

use std::path::PathBuf;

use thiserror::Error;

/// Invalid user input from the command line or a configuration file.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct CommandLineError(pub String);

/// Another process is already operating on the same backup location.
#[derive(Error, Debug)]
#[error("Vintage Backup is already running {operation} on {} (PID {pid})", .location.display())]
pub struct ConcurrencyError {
    pub pid: String,
    pub operation: String,
    pub location: PathBuf,
}
