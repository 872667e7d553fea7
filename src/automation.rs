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

//! Generating files that automate backup runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::{cli::Cli, config, errors::CommandLineError, ui::cli, utils};

/// Generate a config file, a batch script, and a VBScript wrapper for use
/// with Windows Task Scheduler. The VBScript runs the backup without opening
/// a console window.
pub fn generate_windows_scripts(args: &Cli) -> Result<()> {
    let Some(destination) = &args.generate_windows_scripts else {
        bail!(CommandLineError("Script directory not specified.".to_string()));
    };
    let destination = utils::absolute_path(Path::new(destination));
    std::fs::create_dir_all(&destination).with_context(|| {
        format!("Could not create script directory '{}'", destination.display())
    })?;

    let config_path = config::generate_config(args, &destination.join("config.txt"))?;

    let executable =
        std::env::current_exe().unwrap_or_else(|_| PathBuf::from("vintagebackup"));
    let batch_file = utils::unique_path_name(&destination.join("batch_script.bat"));
    std::fs::write(
        &batch_file,
        format!(
            "\"{}\" --config \"{}\"\n",
            executable.display(),
            config_path.display()
        ),
    )
    .with_context(|| format!("Could not write '{}'", batch_file.display()))?;
    cli::log!("Generated batch script: {}", batch_file.display());

    let vb_script_file = utils::unique_path_name(&destination.join("vb_script.vbs"));
    std::fs::write(
        &vb_script_file,
        format!(
            "Dim Shell\n\
             Set Shell = CreateObject(\"WScript.Shell\")\n\
             Shell.Run \"\"\"{}\"\"\", 0, true\n\
             Set Shell = Nothing\n",
            batch_file.display()
        ),
    )
    .with_context(|| format!("Could not write '{}'", vb_script_file.display()))?;
    cli::log!("Generated VB script: {}", vb_script_file.display());
    Ok(())
}
