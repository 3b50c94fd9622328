//! Tombstones for files that disappeared from the source
//!
//! A manifest entry that was not seen during traversal, whose backup copy still
//! exists and whose source location is empty, gets a symbolic link at the
//! source location pointing at the backup copy. The manifest entry is kept as
//! is. Link failures are logged and never abort the run.

use crate::backup::{BackupSummary, SyncRoots};
use crate::log::{BackupEvent, LogSink};
use crate::manifest::Manifest;
use crate::relpath::{confine, LinkPolicy, RelativePath};
use crate::sync::SeenSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, span, warn, Level};

/// Materializes tombstone links after traversal
pub struct TombstoneResolver<'a> {
    roots: &'a SyncRoots,
    log: &'a mut dyn LogSink,
}

impl<'a> TombstoneResolver<'a> {
    pub fn new(roots: &'a SyncRoots, log: &'a mut dyn LogSink) -> Self {
        Self { roots, log }
    }

    /// Link every unseen entry back to its backup copy and return the manifest unchanged
    pub fn resolve(
        &mut self,
        manifest: Manifest,
        seen: &SeenSet,
        summary: &mut BackupSummary,
    ) -> Manifest {
        let span = span!(Level::INFO, "tombstones", tracked = manifest.len(), seen = seen.len());
        let _enter = span.enter();

        for (key, _) in manifest.iter().filter(|(key, _)| !seen.contains(key)) {
            self.resolve_entry(key, summary);
        }

        manifest
    }

    fn resolve_entry(&mut self, key: &str, summary: &mut BackupSummary) {
        let located = RelativePath::parse(key).and_then(|rel| {
            let backup = confine(self.roots.backup(), &rel, LinkPolicy::RejectFinal)?;
            let source = confine(self.roots.source(), &rel, LinkPolicy::AllowFinal)?;
            Ok((backup, source))
        });

        let (backup_path, source_path) = match located {
            Ok(paths) => paths,
            Err(e) => {
                summary.skipped += 1;
                self.log.emit(&BackupEvent::Rejected {
                    path: key.to_string(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        if !backup_path.is_file() {
            warn!("{} is tracked but missing from the backup", key);
            return;
        }

        // Anything at the source location, even a dangling link, stays untouched.
        if source_path.symlink_metadata().is_ok() {
            debug!("{} still present in source", key);
            return;
        }

        match create_tombstone(&source_path, &backup_path) {
            Ok(()) => {
                summary.tombstones += 1;
                self.log.emit(&BackupEvent::SoftLinkCreated {
                    path: key.to_string(),
                });
            }
            Err(e) => {
                summary.failed += 1;
                self.log.emit(&BackupEvent::SoftLinkFailed {
                    path: key.to_string(),
                    cause: e.to_string(),
                });
            }
        }
    }
}

fn create_tombstone(link: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }
    symlink_file(target, link)
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink_file(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}
