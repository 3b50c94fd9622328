//! Backup runs: root preparation and the phase sequence
//!
//! A run loads the manifest, walks the source, applies every entry through the
//! [`SyncEngine`], places tombstones for vanished files and finally rewrites
//! the manifest. The manifest moves through these phases by value.

use crate::log::{BackupEvent, LogSink};
use crate::manifest::ManifestStore;
use crate::sync::SyncEngine;
use crate::tombstone::TombstoneResolver;
use crate::walker::TreeWalker;
use crate::{Error, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, span, Level};

/// Canonical source and backup roots of a run
#[derive(Debug, Clone)]
pub struct SyncRoots {
    source: PathBuf,
    backup: PathBuf,
}

impl SyncRoots {
    /// Check the source root, create the backup root and canonicalize both
    pub fn prepare(source: &Path, backup: &Path) -> Result<Self> {
        let source_unavailable = || Error::SourceUnavailable {
            path: source.to_path_buf(),
        };

        if !source.is_dir() {
            return Err(source_unavailable());
        }
        let source = fs::canonicalize(source).map_err(|_| source_unavailable())?;

        let backup_unavailable = |e| Error::BackupRootUnavailable {
            path: backup.to_path_buf(),
            source: e,
        };
        fs::create_dir_all(backup).map_err(backup_unavailable)?;
        let backup = fs::canonicalize(backup).map_err(backup_unavailable)?;

        if source.starts_with(&backup) {
            return Err(Error::OverlappingRoots {
                source_root: source,
                backup_root: backup,
            });
        }

        Ok(Self { source, backup })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Whether the backup root lives inside the source tree
    pub fn backup_inside_source(&self) -> bool {
        self.backup.starts_with(&self.source)
    }
}

/// Counters describing what a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupSummary {
    pub new_files: usize,
    pub changed_files: usize,
    pub unchanged_files: usize,
    pub directories: usize,
    pub tombstones: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BackupSummary {
    /// Number of files written to the backup
    pub fn copied(&self) -> usize {
        self.new_files + self.changed_files
    }
}

impl fmt::Display for BackupSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} new, {} changed, {} unchanged, {} directories, {} soft links, {} skipped, {} failed",
            self.new_files,
            self.changed_files,
            self.unchanged_files,
            self.directories,
            self.tombstones,
            self.skipped,
            self.failed
        )
    }
}

/// A configured backup of one source directory into one backup directory
#[derive(Debug, Clone)]
pub struct Backup {
    source: PathBuf,
    backup: PathBuf,
    exclude_patterns: Vec<String>,
}

impl Backup {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(source: P, backup: Q) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            backup: backup.as_ref().to_path_buf(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Skip source entries matching any of `patterns`
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Run the backup, reporting progress to `log`
    ///
    /// Fails only on fatal conditions: an unusable source or backup root, a
    /// corrupt manifest, or a manifest that cannot be written back.
    pub fn run(&self, log: &mut dyn LogSink) -> Result<BackupSummary> {
        let roots = SyncRoots::prepare(&self.source, &self.backup)?;

        let span = span!(
            Level::INFO,
            "backup",
            source = %roots.source().display(),
            backup = %roots.backup().display()
        );
        let _enter = span.enter();

        log.emit(&BackupEvent::Started {
            source: roots.source().to_path_buf(),
        });

        let store = ManifestStore::new(roots.backup());
        let manifest = store.load()?;

        let mut walker =
            TreeWalker::new(roots.source()).with_exclude_patterns(self.exclude_patterns.clone());
        if roots.backup_inside_source() {
            walker = walker.exclude_dir(roots.backup());
        }

        let mut engine = SyncEngine::new(&roots, manifest, &mut *log);
        engine.run(walker.walk());
        let (manifest, seen, mut summary) = engine.finish();

        let manifest =
            TombstoneResolver::new(&roots, &mut *log).resolve(manifest, &seen, &mut summary);

        store.save(&manifest)?;

        info!("Backup completed: {}", summary);
        Ok(summary)
    }
}

/// Back up `source` into `backup`, reporting progress to `log`
pub fn run_backup<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    backup: Q,
    log: &mut dyn LogSink,
) -> Result<BackupSummary> {
    Backup::new(source, backup).run(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::manifest::MANIFEST_FILE_NAME;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_rejects_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let result = SyncRoots::prepare(
            &temp_dir.path().join("nope"),
            &temp_dir.path().join("backup"),
        );
        assert!(matches!(result, Err(Error::SourceUnavailable { .. })));
        assert!(!temp_dir.path().join("backup").exists());
    }

    #[test]
    fn test_prepare_rejects_file_source() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, b"x")?;

        let result = SyncRoots::prepare(&file, &temp_dir.path().join("backup"));
        assert!(matches!(result, Err(Error::SourceUnavailable { .. })));
        Ok(())
    }

    #[test]
    fn test_prepare_rejects_source_inside_backup() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        fs::create_dir_all(&source)?;

        assert!(matches!(
            SyncRoots::prepare(&source, &source),
            Err(Error::OverlappingRoots { .. })
        ));
        assert!(matches!(
            SyncRoots::prepare(&source, temp_dir.path()),
            Err(Error::OverlappingRoots { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_prepare_backup_root_blocked_by_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        fs::create_dir_all(&source)?;
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"x")?;

        assert!(matches!(
            SyncRoots::prepare(&source, &blocker.join("backup")),
            Err(Error::BackupRootUnavailable { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_simple_backup() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        let backup = temp_dir.path().join("backup");
        fs::create_dir_all(source.join("docs"))?;
        fs::write(source.join("docs/note.txt"), b"Hello, world!")?;

        let mut log = MemoryLog::new();
        let summary = run_backup(&source, &backup, &mut log)?;

        assert_eq!(summary.new_files, 1);
        assert_eq!(summary.directories, 1);
        assert_eq!(fs::read(backup.join("docs/note.txt"))?, b"Hello, world!");
        assert!(backup.join(MANIFEST_FILE_NAME).exists());
        assert!(log.lines()[0].starts_with("Starting backup from: "));
        Ok(())
    }

    #[test]
    fn test_backup_nested_in_source_is_not_copied_into_itself() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        fs::create_dir_all(&source)?;
        fs::write(source.join("data.txt"), b"data")?;
        let backup = source.join(".syncnest");

        let mut log = MemoryLog::new();
        run_backup(&source, &backup, &mut log)?;
        let second = run_backup(&source, &backup, &mut log)?;

        assert_eq!(second.new_files, 0);
        assert_eq!(second.unchanged_files, 1);
        assert!(!backup.join(".syncnest").exists());
        Ok(())
    }

    #[test]
    fn test_exclude_patterns_apply() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        let backup = temp_dir.path().join("backup");
        fs::create_dir_all(&source)?;
        fs::write(source.join("keep.txt"), b"keep")?;
        fs::write(source.join("drop.tmp"), b"drop")?;

        let mut log = MemoryLog::new();
        Backup::new(&source, &backup)
            .with_exclude_patterns(vec!["*.tmp".to_string()])
            .run(&mut log)?;

        assert!(backup.join("keep.txt").exists());
        assert!(!backup.join("drop.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_summary_display() {
        let summary = BackupSummary {
            new_files: 2,
            changed_files: 1,
            ..Default::default()
        };
        assert_eq!(summary.copied(), 3);
        assert_eq!(
            summary.to_string(),
            "2 new, 1 changed, 0 unchanged, 0 directories, 0 soft links, 0 skipped, 0 failed"
        );
    }
}
