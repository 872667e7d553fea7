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

pub mod archiver;
pub mod automation;
pub mod cli;
pub mod compare;
pub mod config;
pub mod errors;
pub mod filter;
pub mod interrupt;
pub mod layout;
pub mod lock;
pub mod mover;
pub mod prune;
pub mod purge;
pub mod recover;
pub mod restore;
pub mod timespan;
pub mod ui;
pub mod utils;
pub mod verify;
