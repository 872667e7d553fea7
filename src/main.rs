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

use std::path::Path;

use anyhow::Result;
use clap::CommandFactory;

use vintagebackup::{
    archiver, automation,
    cli::{self, Cli},
    config,
    errors::{CommandLineError, ConcurrencyError},
    filter, interrupt, layout, mover, prune, purge, recover, restore,
    ui::cli as ui_cli,
    utils, verify,
};

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    std::process::exit(run(&argv));
}

fn run(argv: &[String]) -> i32 {
    if argv.is_empty() {
        let _ = Cli::command().print_long_help();
        return 0;
    }

    let args = match cli::parse_command_line(argv) {
        Ok(args) => args,
        Err(error) => {
            if let Some(clap_error) = error.downcast_ref::<clap::Error>() {
                let _ = clap_error.print();
                return match clap_error.kind() {
                    clap::error::ErrorKind::DisplayHelp
                    | clap::error::ErrorKind::DisplayVersion => 0,
                    _ => 1,
                };
            }
            ui_cli::error!("{error}");
            return 1;
        }
    };

    interrupt::install_handler();
    ui_cli::set_debug(args.debug_enabled());
    if let Err(error) = set_up_logging(&args) {
        ui_cli::error!("{error}");
        return 1;
    }

    match dispatch(&args) {
        Ok(()) => 0,
        Err(error) => {
            if error.downcast_ref::<CommandLineError>().is_some()
                || error.downcast_ref::<ConcurrencyError>().is_some()
            {
                ui_cli::error!("{error}");
            } else {
                ui_cli::error!("The program ended unexpectedly with an error:");
                ui_cli::error!("{error:?}");
            }
            1
        }
    }
}

fn set_up_logging(args: &Cli) -> Result<()> {
    let log_path = layout::primary_log_path(args.log.as_deref(), args.backup_folder.as_deref());
    if let Some(log_path) = &log_path {
        ui_cli::open_log_file(log_path)?;
        if let Some(backup_folder) = &args.backup_folder {
            let backup_folder = utils::absolute_path(Path::new(backup_folder));
            if backup_folder.is_dir()
                && let Err(error) = layout::record_backup_log_file(log_path, &backup_folder)
            {
                ui_cli::debug!("Could not record log file location: {error}");
            }
        }
    }

    if let Some(error_log) = &args.error_log {
        ui_cli::open_error_log_file(Path::new(error_log))?;
    }
    Ok(())
}

fn dispatch(args: &Cli) -> Result<()> {
    let mut prompter = args.prompter();

    if let Some(generate_config) = &args.generate_config {
        let target = utils::absolute_path(Path::new(generate_config));
        config::generate_config(args, &target).map(|_| ())
    } else if args.generate_windows_scripts.is_some() {
        automation::generate_windows_scripts(args)
    } else if args.recover.is_some() {
        recover::start_recovery_from_backup(args, prompter.as_mut())
    } else if args.list.is_some() {
        recover::choose_recovery_target_from_backups(args, prompter.as_mut())
    } else if args.move_backup.is_some() {
        mover::start_move_backups(args)
    } else if args.verify.is_some() {
        verify::start_verify_backup(args)
    } else if args.restore {
        restore::start_backup_restore(args, prompter.as_mut())
    } else if args.purge.is_some() {
        purge::start_backup_purge(args, prompter.as_mut())
    } else if args.purge_list.is_some() {
        purge::choose_purge_target_from_backups(args, prompter.as_mut())
    } else if args.delete_only {
        prune::start_delete_only(args)
    } else if args.preview_filter.is_some() {
        filter::preview_filter(args)
    } else {
        archiver::start_backup(args)
    }
}
