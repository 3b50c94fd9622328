//! Command-line interface for SyncNest.
//!
//! This module provides the clap front end for running backups, inspecting the
//! manifest and persisting settings.

use crate::config::SyncNestConfig;
use clap::{Parser, Subcommand};
use std::path::Path;

pub mod backup;
pub mod config;
pub mod manifest;

/// SyncNest - incremental, content-addressed directory backup
#[derive(Parser)]
#[command(name = "syncnest")]
#[command(about = "Mirror a directory into a backup directory, copying only what changed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable debug tracing
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Back up the source directory into the backup directory
    Backup(backup::BackupArgs),
    /// Show or verify the manifest of a backup directory
    Manifest(manifest::ManifestArgs),
    /// Persist default settings
    Config(config::ConfigArgs),
}

/// Load settings from `path`, or from the default location
pub(crate) fn load_config(path: Option<&Path>) -> crate::Result<SyncNestConfig> {
    match path {
        Some(path) => SyncNestConfig::load_from(path),
        None => SyncNestConfig::load(),
    }
}
