//! Source tree traversal
//!
//! [`TreeWalker::walk`] returns a lazy iterator over every entry below the
//! source root. Each call starts a fresh traversal. Entries that cannot be
//! classified are yielded as `Err` items so the consumer can log them and keep
//! going.

use crate::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Kind of a yielded entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// An entry below the source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path relative to the source root
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl WalkEntry {
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
        }
    }
}

/// Recursive walker over a source directory
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
    excluded_dirs: Vec<PathBuf>,
    exclude_patterns: Vec<String>,
}

impl TreeWalker {
    /// Create a walker rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            root: fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()),
            excluded_dirs: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Never descend into `dir` (an absolute path below the root)
    pub fn exclude_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.excluded_dirs.push(dir.into());
        self
    }

    /// Skip entries whose relative path matches any of `patterns`
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a traversal of the source tree
    pub fn walk(&self) -> Walk<'_> {
        let inner = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Walk {
            walker: self,
            inner,
        }
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded_dirs.iter().any(|dir| dir == path) {
            return true;
        }

        if self.exclude_patterns.is_empty() {
            return false;
        }

        let relative = slash_path(self.relative(path));
        self.exclude_patterns
            .iter()
            .any(|pattern| matches_pattern(&relative, pattern))
    }

    fn classify(&self, entry: &walkdir::DirEntry) -> Result<WalkEntry> {
        let relative = self.relative(entry.path()).to_path_buf();
        let file_type = entry.file_type();

        if file_type.is_dir() {
            Ok(WalkEntry::directory(relative))
        } else if file_type.is_file() {
            Ok(WalkEntry::file(relative))
        } else if file_type.is_symlink() {
            self.classify_link(entry.path(), relative)
        } else {
            Err(Error::NonRegular { path: relative })
        }
    }

    /// Links are only followed to regular files inside the root
    fn classify_link(&self, path: &Path, relative: PathBuf) -> Result<WalkEntry> {
        let resolved = fs::canonicalize(path);

        let target = match &resolved {
            Ok(target) => target.clone(),
            Err(_) => {
                let raw = fs::read_link(path).map_err(|source| Error::Unreadable {
                    path: relative.clone(),
                    source,
                })?;
                let base = path.parent().unwrap_or(&self.root);
                lexical_normalize(&base.join(raw))
            }
        };

        if !target.starts_with(&self.root) {
            return Err(Error::ExternalLink {
                path: relative,
                target,
            });
        }

        match resolved {
            Ok(target) if target.is_file() => Ok(WalkEntry::file(relative)),
            Ok(_) => Err(Error::NonRegular { path: relative }),
            Err(source) => Err(Error::Unreadable {
                path: relative,
                source,
            }),
        }
    }
}

/// Lazy traversal returned by [`TreeWalker::walk`]
pub struct Walk<'a> {
    walker: &'a TreeWalker,
    inner: walkdir::IntoIter,
}

impl Iterator for Walk<'_> {
    type Item = Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping entry due to error: {}", e);
                    return Some(Err(Error::Walkdir(e)));
                }
            };

            if self.walker.is_excluded(entry.path()) {
                debug!("Excluding {}", entry.path().display());
                if entry.file_type().is_dir() {
                    self.inner.skip_current_dir();
                }
                continue;
            }

            return Some(self.walker.classify(&entry));
        }
    }
}

/// Simple pattern matching (supports * wildcard)
///
/// `*` matches everything, `prefix*suffix` matches the whole relative path,
/// anything else must equal the path or one of its segments.
pub fn matches_pattern(text: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            let prefix = parts[0];
            let suffix = parts[1];
            return text.len() >= prefix.len() + suffix.len()
                && text.starts_with(prefix)
                && text.ends_with(suffix);
        }
    }

    text == pattern || text.split('/').any(|part| part == pattern)
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn collect_ok(walker: &TreeWalker) -> Vec<WalkEntry> {
        walker.walk().filter_map(|e| e.ok()).collect()
    }

    #[test]
    fn test_walk_yields_files_and_directories() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/empty"))?;
        fs::write(root.join("a/b.txt"), b"hello")?;
        fs::write(root.join("top.txt"), b"top")?;

        let entries = collect_ok(&TreeWalker::new(root));
        assert_eq!(
            entries,
            vec![
                WalkEntry::directory("a"),
                WalkEntry::file(Path::new("a").join("b.txt")),
                WalkEntry::directory(Path::new("a").join("empty")),
                WalkEntry::file("top.txt"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_walk_is_restartable() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("one.txt"), b"1")?;

        let walker = TreeWalker::new(temp_dir.path());
        assert_eq!(collect_ok(&walker), collect_ok(&walker));
        Ok(())
    }

    #[test]
    fn test_excluded_directory_is_pruned() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = fs::canonicalize(temp_dir.path())?;
        fs::create_dir_all(root.join("backup/nested"))?;
        fs::write(root.join("backup/nested/copy.txt"), b"copy")?;
        fs::write(root.join("keep.txt"), b"keep")?;

        let walker = TreeWalker::new(&root).exclude_dir(root.join("backup"));
        assert_eq!(collect_ok(&walker), vec![WalkEntry::file("keep.txt")]);
        Ok(())
    }

    #[test]
    fn test_exclude_patterns() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".git"))?;
        fs::write(root.join(".git/HEAD"), b"ref")?;
        fs::write(root.join("scratch.tmp"), b"tmp")?;
        fs::write(root.join("notes.txt"), b"notes")?;

        let walker = TreeWalker::new(root)
            .with_exclude_patterns(vec!["*.tmp".to_string(), ".git".to_string()]);
        assert_eq!(collect_ok(&walker), vec![WalkEntry::file("notes.txt")]);
        Ok(())
    }

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("test.tmp", "*.tmp"));
        assert!(matches_pattern("deep/dir/test.tmp", "*.tmp"));
        assert!(matches_pattern("path/to/.git/file", ".git"));
        assert!(!matches_pattern("test.txt", "*.tmp"));
        assert!(!matches_pattern("a", "a*a"));
        assert!(matches_pattern("anything", "*"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_classified() -> Result<()> {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new()?;
        let outside = TempDir::new()?;
        let root = &fs::canonicalize(temp_dir.path())?;
        fs::write(root.join("real.txt"), b"real")?;
        fs::write(outside.path().join("secret.txt"), b"secret")?;
        fs::create_dir(root.join("dir"))?;
        symlink(root.join("real.txt"), root.join("alias.txt"))?;
        symlink(outside.path().join("secret.txt"), root.join("escape.txt"))?;
        symlink(root.join("dir"), root.join("dirlink"))?;
        symlink(root.join("missing.txt"), root.join("broken.txt"))?;

        let results: Vec<Result<WalkEntry>> = TreeWalker::new(root).walk().collect();
        assert_eq!(results.len(), 6);

        let find = |name: &str| {
            results
                .iter()
                .find(|r| match r {
                    Ok(entry) => entry.path == Path::new(name),
                    Err(Error::NonRegular { path })
                    | Err(Error::ExternalLink { path, .. })
                    | Err(Error::Unreadable { path, .. }) => path == Path::new(name),
                    Err(_) => false,
                })
                .unwrap_or_else(|| panic!("{name} not yielded"))
        };

        assert!(matches!(find("alias.txt"), Ok(WalkEntry { kind: EntryKind::File, .. })));
        assert!(matches!(find("escape.txt"), Err(Error::ExternalLink { .. })));
        assert!(matches!(find("dirlink"), Err(Error::NonRegular { .. })));
        assert!(matches!(find("broken.txt"), Err(Error::Unreadable { .. })));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_is_non_regular() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let fifo = temp_dir.path().join("pipe");
        let status = std::process::Command::new("mkfifo").arg(&fifo).status();
        if !matches!(status, Ok(s) if s.success()) {
            return Ok(());
        }

        let results: Vec<Result<WalkEntry>> = TreeWalker::new(temp_dir.path()).walk().collect();
        assert!(matches!(results.as_slice(), [Err(Error::NonRegular { .. })]));
        Ok(())
    }
}
