//! # SyncNest
//!
//! Incremental, content-addressed backup of one directory tree into another.
//!
//! ## Features
//!
//! - **Incremental Sync**: Files are copied only when their SHA-256 fingerprint changed
//! - **Manifest**: `manifest.json` in the backup root records every backed-up file
//! - **Tombstones**: Files deleted from the source are replaced by links to their backup copy
//! - **Confinement**: Every path is kept inside its root, whatever the walker or manifest says
//! - **Fault Isolation**: A bad entry becomes a log line, never an aborted run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use syncnest::{run_backup, ConsoleLog};
//!
//! # fn main() -> syncnest::Result<()> {
//! let mut log = ConsoleLog;
//! let summary = run_backup("./my-data", "./backup-output", &mut log)?;
//! println!("Backup completed: {}", summary);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod log;
pub mod logging;
pub mod manifest;
pub mod relpath;
pub mod sync;
pub mod tombstone;
pub mod walker;

// Re-export commonly used types
pub use backup::{run_backup, Backup, BackupSummary, SyncRoots};
pub use config::SyncNestConfig;
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use log::{BackupEvent, ConsoleLog, FileLog, LogSink, MemoryLog};
pub use manifest::{Manifest, ManifestStore, VerifyReport};
pub use walker::{TreeWalker, WalkEntry};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
