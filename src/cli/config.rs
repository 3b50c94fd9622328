//! Config command implementation for persisting default settings.

use crate::config::SyncNestConfig;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Settings file to update instead of the default
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Default source directory
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Default backup directory
    #[arg(short, long)]
    pub backup: Option<PathBuf>,

    /// Default log directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Replace the exclude patterns (repeatable)
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Print the resulting settings
    #[arg(long)]
    pub show: bool,
}

impl ConfigArgs {
    fn has_updates(&self) -> bool {
        self.source.is_some()
            || self.backup.is_some()
            || self.log_dir.is_some()
            || !self.exclude.is_empty()
    }
}

/// Run the config command
pub fn run(args: ConfigArgs) -> Result<()> {
    let mut config = super::load_config(args.config.as_deref())?;

    if args.has_updates() {
        apply_updates(&mut config, &args);
        config.validate()?;

        let path = match &args.config {
            Some(path) => {
                config.save_to(path)?;
                path.clone()
            }
            None => config.save()?,
        };
        println!("Settings saved to {}", path.display());
    }

    if args.show || !args.has_updates() {
        let yaml = serde_yaml::to_string(&config).context("Failed to render settings")?;
        print!("{}", yaml);
    }

    Ok(())
}

fn apply_updates(config: &mut SyncNestConfig, args: &ConfigArgs) {
    if let Some(source) = &args.source {
        config.source_dir = Some(source.clone());
    }
    if let Some(backup) = &args.backup {
        config.backup_dir = Some(backup.clone());
    }
    if let Some(log_dir) = &args.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    if !args.exclude.is_empty() {
        config.exclude = args.exclude.clone();
    }
}
