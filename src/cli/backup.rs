//! Backup command implementation.

use crate::backup::Backup;
use crate::log::{BackupEvent, ConsoleLog, FileLog, LogSink};
use crate::Error;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the backup command
#[derive(Args)]
pub struct BackupArgs {
    /// Source directory to back up
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Backup directory that mirrors the source
    #[arg(short, long)]
    pub backup: Option<PathBuf>,

    /// Directory for the run's log file
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Skip entries matching this pattern (repeatable)
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Settings file to use instead of the default
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Name of the log file for a run started at `started`
pub fn log_file_name(started: DateTime<Utc>) -> String {
    format!("backup_log_{}.txt", started.timestamp_millis())
}

/// Run the backup command
pub fn run(args: BackupArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;

    let source = args
        .source
        .or(config.source_dir)
        .ok_or_else(|| Error::Configuration {
            reason: "no source directory; pass --source or set source_dir".to_string(),
        })?;
    let backup = args
        .backup
        .or(config.backup_dir)
        .ok_or_else(|| Error::Configuration {
            reason: "no backup directory; pass --backup or set backup_dir".to_string(),
        })?;

    let mut exclude = config.exclude;
    exclude.extend(args.exclude);

    let mut file_log = match args.log_dir.or(config.log_dir) {
        Some(dir) => {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(log_file_name(Utc::now()));
            let log = FileLog::create(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(log)
        }
        None => None,
    };
    let log_file = file_log.as_ref().map(|log| log.path().to_path_buf());

    let mut console = ConsoleLog;
    let mut sink = |line: &str| {
        console.log(line);
        if let Some(log) = file_log.as_mut() {
            log.log(line);
        }
    };

    let summary = Backup::new(&source, &backup)
        .with_exclude_patterns(exclude)
        .run(&mut sink)?;

    sink.emit(&BackupEvent::Complete { log_file });
    info!("Summary: {}", summary);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name_uses_unix_millis() {
        let started = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(log_file_name(started), "backup_log_1700000000123.txt");
    }
}
