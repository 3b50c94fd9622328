//! Manifest management: the persisted mapping from relative path to fingerprint

use crate::fingerprint::{hash_file, Fingerprint};
use crate::relpath::{confine, LinkPolicy, RelativePath};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the manifest inside the backup root
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Scratch file the manifest is written to before being renamed into place
pub const MANIFEST_TEMP_NAME: &str = "manifest.json.tmp";

/// What the engine believes is backed up: relative path to last-known fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, Fingerprint>,
}

impl Manifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the fingerprint recorded for a key
    pub fn get(&self, key: &str) -> Option<&Fingerprint> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Record the current fingerprint of `path`, returning the previous one
    pub fn record(&mut self, path: &RelativePath, fingerprint: Fingerprint) -> Option<Fingerprint> {
        self.entries.insert(path.as_str().to_string(), fingerprint)
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.entries.iter().map(|(key, fp)| (key.as_str(), fp))
    }

    /// Check every entry against its backup copy without modifying anything
    pub fn verify(&self, backup_root: &Path) -> VerifyReport {
        let mut report = VerifyReport::default();

        for (key, expected) in self.iter() {
            report.checked += 1;

            let backup_path = match RelativePath::parse(key)
                .and_then(|rel| confine(backup_root, &rel, LinkPolicy::RejectFinal))
            {
                Ok(path) => path,
                Err(e) => {
                    report.rejected.push((key.to_string(), e.to_string()));
                    continue;
                }
            };

            if !backup_path.is_file() {
                report.missing.push(key.to_string());
                continue;
            }

            match hash_file(&backup_path) {
                Ok(actual) if actual == *expected => {}
                Ok(_) => report.mismatched.push(key.to_string()),
                Err(e) => report.unreadable.push((key.to_string(), e.to_string())),
            }
        }

        report
    }
}

/// Outcome of [`Manifest::verify`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of entries examined
    pub checked: usize,
    /// Entries with no backup copy
    pub missing: Vec<String>,
    /// Entries whose backup copy no longer matches the recorded fingerprint
    pub mismatched: Vec<String>,
    /// Entries whose backup copy could not be read, with the cause
    pub unreadable: Vec<(String, String)>,
    /// Keys that do not name a safe location under the backup root
    pub rejected: Vec<(String, String)>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.mismatched.is_empty()
            && self.unreadable.is_empty()
            && self.rejected.is_empty()
    }
}

/// Loads and persists the manifest document under a backup root
#[derive(Debug)]
pub struct ManifestStore {
    manifest_path: PathBuf,
    temp_path: PathBuf,
}

impl ManifestStore {
    /// Create a store for the given backup root
    pub fn new<P: AsRef<Path>>(backup_root: P) -> Self {
        let backup_root = backup_root.as_ref();
        Self {
            manifest_path: backup_root.join(MANIFEST_FILE_NAME),
            temp_path: backup_root.join(MANIFEST_TEMP_NAME),
        }
    }

    /// Load the manifest, or an empty one if none has been written yet
    pub fn load(&self) -> Result<Manifest> {
        let content = match fs::read_to_string(&self.manifest_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No manifest at {}, starting empty", self.manifest_path.display());
                return Ok(Manifest::new());
            }
            Err(e) => {
                return Err(Error::CorruptManifest {
                    path: self.manifest_path.clone(),
                    reason: format!("cannot read manifest: {}", e),
                })
            }
        };

        let manifest: Manifest =
            serde_json::from_str(&content).map_err(|e| Error::CorruptManifest {
                path: self.manifest_path.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            "Loaded {} manifest entries from {}",
            manifest.len(),
            self.manifest_path.display()
        );
        Ok(manifest)
    }

    /// Replace the persisted manifest with `manifest`
    ///
    /// The document is written to a scratch file and renamed over the old one,
    /// so readers see either the previous manifest or the new one.
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        self.write_temp(manifest).map_err(|source| Error::Persistence {
            path: self.temp_path.clone(),
            source,
        })?;

        fs::rename(&self.temp_path, &self.manifest_path).map_err(|source| Error::Persistence {
            path: self.manifest_path.clone(),
            source,
        })?;

        debug!(
            "Saved {} manifest entries to {}",
            manifest.len(),
            self.manifest_path.display()
        );
        Ok(())
    }

    fn write_temp(&self, manifest: &Manifest) -> io::Result<()> {
        let file = File::create(&self.temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, manifest)?;
        writer.write_all(b"\n")?;

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }

    /// Get the path of the manifest document
    pub fn path(&self) -> &Path {
        &self.manifest_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_manifest() -> Result<Manifest> {
        let mut manifest = Manifest::new();
        manifest.record(&RelativePath::parse("a/b.txt")?, Fingerprint::from_bytes(b"hello"));
        manifest.record(&RelativePath::parse("c.txt")?, Fingerprint::from_bytes(b"world"));
        Ok(manifest)
    }

    #[test]
    fn test_load_missing_manifest_is_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = ManifestStore::new(temp_dir.path());
        assert!(store.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_manifest_round_trip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = ManifestStore::new(temp_dir.path());
        let manifest = sample_manifest()?;

        store.save(&manifest)?;
        let first = fs::read_to_string(store.path())?;
        let loaded = store.load()?;
        assert_eq!(loaded, manifest);

        store.save(&loaded)?;
        assert_eq!(fs::read_to_string(store.path())?, first);
        assert!(!temp_dir.path().join(MANIFEST_TEMP_NAME).exists());
        Ok(())
    }

    #[test]
    fn test_manifest_document_is_flat_object() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = ManifestStore::new(temp_dir.path());
        store.save(&sample_manifest()?)?;

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
        let object = value.as_object().expect("manifest should be a JSON object");
        assert_eq!(
            object["a/b.txt"],
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(object.len(), 2);
        Ok(())
    }

    #[test]
    fn test_load_corrupt_manifest_fails() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = ManifestStore::new(temp_dir.path());

        fs::write(store.path(), b"{ not json")?;
        assert!(matches!(store.load(), Err(Error::CorruptManifest { .. })));

        fs::write(store.path(), br#"{"a.txt": 42}"#)?;
        assert!(matches!(store.load(), Err(Error::CorruptManifest { .. })));

        fs::write(store.path(), br#"["a.txt"]"#)?;
        assert!(matches!(store.load(), Err(Error::CorruptManifest { .. })));
        Ok(())
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = ManifestStore::new(temp_dir.path().join("does-not-exist"));

        let result = store.save(&Manifest::new());
        assert!(matches!(result, Err(Error::Persistence { .. })));
    }

    #[test]
    fn test_verify_reports_missing_and_mismatched() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a"))?;
        fs::write(root.join("a/b.txt"), b"hello")?;
        fs::write(root.join("c.txt"), b"tampered")?;

        let mut manifest = sample_manifest()?;
        manifest.record(&RelativePath::parse("gone.txt")?, Fingerprint::from_bytes(b"x"));
        manifest
            .entries
            .insert("../outside.txt".to_string(), Fingerprint::from_bytes(b"y"));

        let report = manifest.verify(root);
        assert_eq!(report.checked, 4);
        assert_eq!(report.missing, vec!["gone.txt".to_string()]);
        assert_eq!(report.mismatched, vec!["c.txt".to_string()]);
        assert_eq!(report.rejected.len(), 1);
        assert!(!report.is_clean());
        Ok(())
    }
}
