//! SyncNest - incremental, content-addressed directory backup
//!
//! Main binary entry point for the command-line interface.

use clap::Parser;
use std::process::ExitCode;
use syncnest::cli::{Cli, Commands};
use syncnest::logging::init_logging;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let (label, result) = match cli.command {
        Commands::Backup(args) => ("Backup failed", syncnest::cli::backup::run(args)),
        Commands::Manifest(args) => ("Manifest command failed", syncnest::cli::manifest::run(args)),
        Commands::Config(args) => ("Config command failed", syncnest::cli::config::run(args)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", label, e);
            ExitCode::from(1)
        }
    }
}
