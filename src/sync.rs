//! Per-entry diff and copy logic
//!
//! [`SyncEngine`] consumes walk entries one at a time. Files are fingerprinted
//! on both sides and copied only when the backup copy is missing or differs;
//! the manifest always ends up with the source fingerprint, even for unchanged
//! files. Every problem with a single entry becomes a log line and the engine
//! moves on.

use crate::backup::{BackupSummary, SyncRoots};
use crate::fingerprint::{hash_file, Fingerprint};
use crate::log::{BackupEvent, LogSink};
use crate::manifest::{Manifest, MANIFEST_FILE_NAME, MANIFEST_TEMP_NAME};
use crate::relpath::{confine, LinkPolicy, RelativePath};
use crate::walker::{EntryKind, WalkEntry};
use crate::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, span, Level};

/// Relative paths observed in the source during the current run
#[derive(Debug, Clone, Default)]
pub struct SeenSet(HashSet<String>);

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &RelativePath) -> bool {
        self.0.insert(path.as_str().to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of comparing a source file with its backup copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    New,
    Changed,
    Unchanged,
}

/// Applies walk entries to the backup tree and the in-memory manifest
pub struct SyncEngine<'a> {
    roots: &'a SyncRoots,
    manifest: Manifest,
    seen: SeenSet,
    summary: BackupSummary,
    log: &'a mut dyn LogSink,
}

impl<'a> SyncEngine<'a> {
    /// Take ownership of the manifest for the duration of the traversal
    pub fn new(roots: &'a SyncRoots, manifest: Manifest, log: &'a mut dyn LogSink) -> Self {
        Self {
            roots,
            manifest,
            seen: SeenSet::new(),
            summary: BackupSummary::default(),
            log,
        }
    }

    /// Apply every entry of a traversal in order
    pub fn run<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = Result<WalkEntry>>,
    {
        let span = span!(Level::INFO, "sync", source = %self.roots.source().display());
        let _enter = span.enter();

        for entry in entries {
            self.apply(entry);
        }
    }

    /// Apply a single walk result
    pub fn apply(&mut self, entry: Result<WalkEntry>) {
        match entry {
            Ok(WalkEntry {
                path,
                kind: EntryKind::File,
            }) => self.sync_file(&path),
            Ok(WalkEntry {
                path,
                kind: EntryKind::Directory,
            }) => self.sync_directory(&path),
            Err(e) => self.skip_entry(e),
        }
    }

    /// Hand the manifest on to the next phase
    pub fn finish(self) -> (Manifest, SeenSet, BackupSummary) {
        (self.manifest, self.seen, self.summary)
    }

    fn sync_file(&mut self, path: &Path) {
        let Some(rel) = self.admit(path) else {
            return;
        };
        self.seen.insert(&rel);

        let Some((source, dest)) = self.locate(&rel, LinkPolicy::AllowFinal) else {
            return;
        };

        match copy_if_changed(&source, &dest) {
            Ok((outcome, fingerprint)) => {
                self.manifest.record(&rel, fingerprint);
                let path = rel.to_string();
                match outcome {
                    FileOutcome::New => {
                        self.summary.new_files += 1;
                        self.log.emit(&BackupEvent::NewBackup { path });
                    }
                    FileOutcome::Changed => {
                        self.summary.changed_files += 1;
                        self.log.emit(&BackupEvent::ChangeBackedUp { path });
                    }
                    FileOutcome::Unchanged => {
                        self.summary.unchanged_files += 1;
                        debug!("{} unchanged", path);
                    }
                }
            }
            Err(e) => {
                self.summary.failed += 1;
                self.log.emit(&BackupEvent::BackupFailed {
                    path: rel.to_string(),
                    cause: e.to_string(),
                });
            }
        }
    }

    fn sync_directory(&mut self, path: &Path) {
        let Some(rel) = self.admit(path) else {
            return;
        };
        self.seen.insert(&rel);

        let Some((_, dest)) = self.locate(&rel, LinkPolicy::RejectFinal) else {
            return;
        };

        if let Err(e) = fs::create_dir_all(&dest) {
            self.summary.failed += 1;
            self.log.emit(&BackupEvent::BackupFailed {
                path: rel.to_string(),
                cause: e.to_string(),
            });
            return;
        }

        self.summary.directories += 1;
        self.log.emit(&BackupEvent::DirectoryBackedUp {
            path: rel.to_string(),
        });
    }

    /// Validate a walked path, logging why it is refused
    fn admit(&mut self, path: &Path) -> Option<RelativePath> {
        let rel = match RelativePath::from_path(path) {
            Ok(rel) => rel,
            Err(e) => {
                self.reject(path.to_string_lossy().into_owned(), e);
                return None;
            }
        };

        if rel.as_str() == MANIFEST_FILE_NAME || rel.as_str() == MANIFEST_TEMP_NAME {
            self.summary.skipped += 1;
            self.log.emit(&BackupEvent::Reserved {
                path: rel.to_string(),
            });
            return None;
        }

        Some(rel)
    }

    /// Resolve `rel` under both roots
    fn locate(&mut self, rel: &RelativePath, source_policy: LinkPolicy) -> Option<(PathBuf, PathBuf)> {
        let located = confine(self.roots.source(), rel, source_policy).and_then(|source| {
            confine(self.roots.backup(), rel, LinkPolicy::RejectFinal).map(|dest| (source, dest))
        });

        match located {
            Ok(paths) => Some(paths),
            Err(e) => {
                self.reject(rel.to_string(), e);
                None
            }
        }
    }

    fn reject(&mut self, path: String, error: Error) {
        self.summary.skipped += 1;
        self.log.emit(&BackupEvent::Rejected {
            path,
            reason: error.to_string(),
        });
    }

    fn skip_entry(&mut self, error: Error) {
        match error {
            Error::ExternalLink { path, target } if target.starts_with(self.roots.backup()) => {
                // An existing tombstone from an earlier run.
                if let Ok(rel) = RelativePath::from_path(&path) {
                    self.seen.insert(&rel);
                }
                debug!("Keeping soft link {} -> {}", path.display(), target.display());
            }
            Error::ExternalLink { path, target } => {
                self.summary.skipped += 1;
                self.log.emit(&BackupEvent::ExternalLink { path, target });
            }
            Error::NonRegular { path } => {
                self.summary.skipped += 1;
                self.log.emit(&BackupEvent::NonRegular { path });
            }
            Error::PathTraversal { path, reason } => {
                self.summary.skipped += 1;
                self.log.emit(&BackupEvent::Rejected { path, reason });
            }
            Error::Unreadable { path, source } => {
                self.summary.failed += 1;
                self.log.emit(&BackupEvent::Unreadable {
                    path,
                    cause: source.to_string(),
                });
            }
            Error::Walkdir(e) => {
                let path = e
                    .path()
                    .map(|p| p.strip_prefix(self.roots.source()).unwrap_or(p).to_path_buf())
                    .unwrap_or_default();
                let cause = e
                    .io_error()
                    .map(|io| io.to_string())
                    .unwrap_or_else(|| e.to_string());
                self.summary.failed += 1;
                self.log.emit(&BackupEvent::Unreadable { path, cause });
            }
            other => {
                self.summary.failed += 1;
                self.log.emit(&BackupEvent::BackupFailed {
                    path: String::new(),
                    cause: other.to_string(),
                });
            }
        }
    }
}

/// Fingerprint both sides and copy when the backup copy is missing or stale
pub fn copy_if_changed(source: &Path, dest: &Path) -> Result<(FileOutcome, Fingerprint)> {
    let source_fp = hash_file(source)?;

    let dest_fp = if dest.symlink_metadata().is_ok() {
        Some(hash_file(dest)?)
    } else {
        None
    };

    let outcome = match dest_fp {
        None => FileOutcome::New,
        Some(ref fp) if *fp == source_fp => return Ok((FileOutcome::Unchanged, source_fp)),
        Some(_) => FileOutcome::Changed,
    };

    copy_file(source, dest)?;
    Ok((outcome, source_fp))
}

/// Full replace of `dest` with the content of `source`
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let copy_error = |e| Error::Copy {
        path: dest.to_path_buf(),
        source: e,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(copy_error)?;
    }
    fs::copy(source, dest).map_err(copy_error)?;
    Ok(())
}
