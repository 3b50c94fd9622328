//! Error types for SyncNest

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for SyncNest operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Source directory unavailable: {path}")]
    SourceUnavailable { path: PathBuf },

    #[error("Cannot create backup directory {path}: {source}")]
    BackupRootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source {source_root} and backup {backup_root} overlap")]
    OverlappingRoots {
        source_root: PathBuf,
        backup_root: PathBuf,
    },

    #[error("Corrupt manifest {path}: {reason}")]
    CorruptManifest { path: PathBuf, reason: String },

    #[error("Could not write manifest {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("{reason}")]
    PathTraversal { path: String, reason: String },

    #[error("{path} is reserved for the manifest")]
    ReservedPath { path: String },

    #[error("{path} is not a regular file")]
    NonRegular { path: PathBuf },

    #[error("{path} links outside the source tree to {target}")]
    ExternalLink { path: PathBuf, target: PathBuf },

    #[error("Could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not copy to {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether this error aborts a run rather than skipping a single entry
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SourceUnavailable { .. }
                | Error::BackupRootUnavailable { .. }
                | Error::OverlappingRoots { .. }
                | Error::CorruptManifest { .. }
                | Error::Persistence { .. }
                | Error::Configuration { .. }
        )
    }
}

/// Result type alias for SyncNest operations
pub type Result<T> = std::result::Result<T, Error>;
