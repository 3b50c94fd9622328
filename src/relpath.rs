//! Validated relative paths and confinement under a root directory
//!
//! Every path the engine touches is built from a [`RelativePath`] joined onto
//! one of the two roots. Construction rejects absolute paths, `..` segments and
//! anything else that could name a location outside the root; [`confine`]
//! additionally refuses paths that would pass through a symbolic link already
//! present under the root.

use crate::{Error, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A forward-slash normalized path relative to the source or backup root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

/// Whether the last component may itself be a symbolic link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicy {
    AllowFinal,
    RejectFinal,
}

impl RelativePath {
    /// Parse a manifest key such as `docs/report.txt`
    pub fn parse(key: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(traversal(key, "empty path"));
        }

        for segment in key.split('/') {
            match segment {
                "" => return Err(traversal(key, "empty or absolute path segment")),
                "." => return Err(traversal(key, "current directory segment")),
                ".." => return Err(traversal(key, "parent directory segment")),
                _ => {}
            }

            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(_)), None) => {}
                _ => return Err(traversal(key, "segment is not a plain file name")),
            }
        }

        Ok(Self(key.to_string()))
    }

    /// Build from a relative filesystem path, e.g. one stripped of the source root
    pub fn from_path(path: &Path) -> Result<Self> {
        let display = path.to_string_lossy();
        let mut segments = Vec::new();

        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name
                        .to_str()
                        .ok_or_else(|| traversal(&display, "path is not valid UTF-8"))?;
                    segments.push(name);
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(traversal(&display, "parent directory segment"));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(traversal(&display, "absolute path"));
                }
            }
        }

        if segments.is_empty() {
            return Err(traversal(&display, "empty path"));
        }

        Self::parse(&segments.join("/"))
    }

    /// Get the normalized form used as a manifest key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Convert to a platform path
    pub fn to_path(&self) -> PathBuf {
        self.segments().collect()
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve `rel` under `root`, refusing to pass through symbolic links
///
/// Intermediate components that already exist must be real directories. The
/// final component is checked according to `policy`.
pub fn confine(root: &Path, rel: &RelativePath, policy: LinkPolicy) -> Result<PathBuf> {
    let segments: Vec<&str> = rel.segments().collect();
    let mut current = root.to_path_buf();

    for (index, segment) in segments.iter().enumerate() {
        current.push(segment);
        let is_final = index + 1 == segments.len();

        match current.symlink_metadata() {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                if !is_final {
                    return Err(traversal(rel.as_str(), "resolves through a symbolic link"));
                }
                if policy == LinkPolicy::RejectFinal {
                    return Err(traversal(rel.as_str(), "target is a symbolic link"));
                }
            }
            Ok(_) => {}
            // Nothing below a missing or unreadable component can be reached.
            Err(_) => break,
        }
    }

    Ok(root.join(rel.to_path()))
}

fn traversal(path: &str, reason: &str) -> Error {
    Error::PathTraversal {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
