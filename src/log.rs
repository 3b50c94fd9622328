//! Progress reporting for backup runs
//!
//! The engine describes what it does as [`BackupEvent`]s. Each event is traced
//! and handed to a [`LogSink`] as one human-readable line; where the line ends
//! up (a file, the console, a UI widget) is up to the caller.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Receiver of progress lines
pub trait LogSink {
    /// Accept one line, without trailing newline
    fn log(&mut self, line: &str);

    /// Trace an event and forward its text
    fn emit(&mut self, event: &BackupEvent) {
        let line = event.to_string();
        if event.is_problem() {
            warn!("{}", line);
        } else {
            debug!("{}", line);
        }
        self.log(&line);
    }
}

impl<F: FnMut(&str)> LogSink for F {
    fn log(&mut self, line: &str) {
        self(line)
    }
}

/// Notable things that happen during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupEvent {
    Started { source: PathBuf },
    NewBackup { path: String },
    ChangeBackedUp { path: String },
    DirectoryBackedUp { path: String },
    SoftLinkCreated { path: String },
    SoftLinkFailed { path: String, cause: String },
    NonRegular { path: PathBuf },
    ExternalLink { path: PathBuf, target: PathBuf },
    Rejected { path: String, reason: String },
    Reserved { path: String },
    BackupFailed { path: String, cause: String },
    Unreadable { path: PathBuf, cause: String },
    Complete { log_file: Option<PathBuf> },
}

impl BackupEvent {
    /// Whether the event reports something that was skipped or failed
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            BackupEvent::SoftLinkFailed { .. }
                | BackupEvent::NonRegular { .. }
                | BackupEvent::ExternalLink { .. }
                | BackupEvent::Rejected { .. }
                | BackupEvent::Reserved { .. }
                | BackupEvent::BackupFailed { .. }
                | BackupEvent::Unreadable { .. }
        )
    }
}

impl fmt::Display for BackupEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupEvent::Started { source } => {
                write!(f, "Starting backup from: {}", source.display())
            }
            BackupEvent::NewBackup { path } => write!(f, "{} new backup", path),
            BackupEvent::ChangeBackedUp { path } => write!(f, "{} change backed up", path),
            BackupEvent::DirectoryBackedUp { path } => write!(f, "{} directory backed up", path),
            BackupEvent::SoftLinkCreated { path } => write!(f, "{} soft link created", path),
            BackupEvent::SoftLinkFailed { path, cause } => {
                write!(f, "Could not create soft link for {}: {}", path, cause)
            }
            BackupEvent::NonRegular { path } => {
                write!(f, "Skipping non-regular file: {}", path.display())
            }
            BackupEvent::ExternalLink { path, target } => write!(
                f,
                "Skipping external link: {} -> {}",
                path.display(),
                target.display()
            ),
            BackupEvent::Rejected { path, reason } => {
                write!(f, "Rejecting unsafe path {}: {}", path, reason)
            }
            BackupEvent::Reserved { path } => write!(f, "Skipping reserved path: {}", path),
            BackupEvent::BackupFailed { path, cause } => {
                write!(f, "Could not back up {}: {}", path, cause)
            }
            BackupEvent::Unreadable { path, cause } => {
                write!(f, "Could not read {}: {}", path.display(), cause)
            }
            BackupEvent::Complete { log_file: Some(log_file) } => {
                write!(f, "Backup complete. Log at {}", log_file.display())
            }
            BackupEvent::Complete { log_file: None } => write!(f, "Backup complete."),
        }
    }
}

/// Appends newline-terminated lines to a log file
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    writer: LineWriter<File>,
}

impl FileLog {
    /// Open `path` for appending, creating it if needed
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: LineWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLog {
    fn log(&mut self, line: &str) {
        if let Err(e) = writeln!(self.writer, "{}", line) {
            warn!("Failed to write to log {}: {}", self.path.display(), e);
        }
    }
}

/// Prints lines to standard output
#[derive(Debug, Default)]
pub struct ConsoleLog;

impl LogSink for ConsoleLog {
    fn log(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// Keeps lines in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    lines: Vec<String>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl LogSink for MemoryLog {
    fn log(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}
