//! Content fingerprints using SHA-256

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read buffer size used when streaming a file through the hasher (8 KiB)
pub const HASH_BUFFER_SIZE: usize = 8 * 1024;

/// Hex-encoded SHA-256 digest of a file's full content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already hex-encoded digest
    pub fn new(hex: String) -> Self {
        Self(hex)
    }

    /// Get the digest as a hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fingerprint an in-memory buffer
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the fingerprint of a file, streaming it in fixed-size chunks
pub fn hash_file<P: AsRef<Path>>(path: P) -> Result<Fingerprint> {
    let path = path.as_ref();
    let hash_error = |source| Error::Hash {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(hash_error)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(hash_error)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_fingerprint_from_bytes() {
        let fp = Fingerprint::from_bytes(b"hello");
        assert_eq!(fp.as_str(), HELLO_SHA256);
        assert_eq!(fp.as_str().len(), 64);
    }

    #[test]
    fn test_hash_file_matches_in_memory_digest() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("hello.txt");
        fs::write(&path, b"hello")?;

        assert_eq!(hash_file(&path)?.as_str(), HELLO_SHA256);
        Ok(())
    }

    #[test]
    fn test_hash_file_spanning_several_buffers() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("large.bin");
        let data: Vec<u8> = (0..HASH_BUFFER_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data)?;

        assert_eq!(hash_file(&path)?, Fingerprint::from_bytes(&data));
        Ok(())
    }

    #[test]
    fn test_hash_missing_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent");

        match hash_file(&path) {
            Err(Error::Hash { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected hash error, got {:?}", other),
        }
    }

    #[test]
    fn test_serializes_as_plain_string() -> Result<()> {
        let fp = Fingerprint::from_bytes(b"hello");
        assert_eq!(serde_json::to_string(&fp)?, format!("\"{}\"", HELLO_SHA256));
        Ok(())
    }
}
