use super::file_node::{FileNode, NodeKind, sort_file_nodes};
use ignore::overrides::{Override, OverrideBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/*
 * This module is the picker's only window onto the filesystem. It lists the
 * immediate children of a directory and reports the kind of a single path,
 * without caching anything: every call re-reads the disk. The trait
 * `DirectoryIndexOperations` is the seam the selection engine depends on, so
 * tests can substitute an index that fails on demand.
 */

/*
 * Errors raised while reading the filesystem. Every variant names the path it
 * concerns so a single error can be shown to the user as-is.
 */
#[derive(Debug)]
pub enum FileSystemError {
    NotFound(PathBuf),
    NotADirectory(PathBuf),
    NotAFile(PathBuf),
    PermissionDenied(PathBuf),
    UnsupportedEntry(PathBuf),
    Io { path: PathBuf, source: io::Error },
}

impl FileSystemError {
    /*
     * Classifies an `io::Error` raised while accessing `path`.
     */
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FileSystemError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => {
                FileSystemError::PermissionDenied(path.to_path_buf())
            }
            io::ErrorKind::NotADirectory => FileSystemError::NotADirectory(path.to_path_buf()),
            _ => FileSystemError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FileSystemError::NotFound(p)
            | FileSystemError::NotADirectory(p)
            | FileSystemError::NotAFile(p)
            | FileSystemError::PermissionDenied(p)
            | FileSystemError::UnsupportedEntry(p) => p,
            FileSystemError::Io { path, .. } => path,
        }
    }
}

impl std::fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSystemError::NotFound(p) => write!(f, "No such file or directory: {}", p.display()),
            FileSystemError::NotADirectory(p) => write!(f, "Not a directory: {}", p.display()),
            FileSystemError::NotAFile(p) => write!(f, "Not a file: {}", p.display()),
            FileSystemError::PermissionDenied(p) => {
                write!(f, "Permission denied: {}", p.display())
            }
            FileSystemError::UnsupportedEntry(p) => {
                write!(f, "Neither a file nor a directory: {}", p.display())
            }
            FileSystemError::Io { path, source } => {
                write!(f, "I/O error on {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileSystemError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FileSystemError>;

/*
 * Lazy, stateless access to directory contents. Implementations must not
 * recurse; callers that walk a tree do so themselves, one `list_children`
 * call per directory.
 */
pub trait DirectoryIndexOperations: Send + Sync {
    /*
     * Lists the immediate children of the directory at `path`, sorted
     * directories-first and then by name. Entries that are neither files nor
     * directories are left out.
     */
    fn list_children(&self, path: &Path) -> Result<Vec<FileNode>>;

    fn stat(&self, path: &Path) -> Result<NodeKind>;

    /*
     * Resolves every symbolic link in `path`. Two paths with the same real path
     * denote the same filesystem object; walks use this to detect cycles.
     */
    fn real_path(&self, path: &Path) -> Result<PathBuf>;
}

/*
 * `DirectoryIndexOperations` over the local filesystem. Symbolic links are
 * followed when determining an entry's kind. Optional exclude patterns hide
 * matching entries from every listing.
 */
pub struct CoreDirectoryIndex {
    excludes: Option<Override>,
}

impl CoreDirectoryIndex {
    pub fn new() -> Self {
        CoreDirectoryIndex { excludes: None }
    }

    /*
     * Builds an index that hides entries matching any of `exclude_patterns`.
     * Patterns use gitignore glob syntax relative to `root`; blank lines and
     * `#` comments are skipped, and a leading `!` turns a pattern into an
     * explicit include. Invalid patterns are logged and dropped.
     */
    pub fn with_exclude_patterns(root: &Path, exclude_patterns: &[String]) -> Self {
        if exclude_patterns.is_empty() {
            return Self::new();
        }

        let mut override_builder = OverrideBuilder::new(root);
        for pattern in exclude_patterns {
            let trimmed = pattern.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            // The override matcher treats plain globs as includes and `!` globs
            // as excludes, which is the reverse of how users write them.
            let override_pattern = match trimmed.strip_prefix('!') {
                Some(negated) if negated.trim().is_empty() => continue,
                Some(negated) => negated.trim().to_string(),
                None => format!("!{trimmed}"),
            };

            if let Err(err) = override_builder.add(&override_pattern) {
                log::warn!("DirectoryIndex: Invalid exclude pattern '{pattern}': {err}");
            }
        }

        match override_builder.build() {
            Ok(overrides) => CoreDirectoryIndex {
                excludes: Some(overrides),
            },
            Err(err) => {
                log::warn!("DirectoryIndex: Failed to build exclude patterns: {err}");
                Self::new()
            }
        }
    }

    fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        self.excludes
            .as_ref()
            .is_some_and(|overrides| overrides.matched(path, is_dir).is_ignore())
    }

    fn kind_from_metadata(path: &Path, metadata: &fs::Metadata) -> Result<NodeKind> {
        if metadata.is_dir() {
            Ok(NodeKind::Directory)
        } else if metadata.is_file() {
            Ok(NodeKind::File)
        } else {
            Err(FileSystemError::UnsupportedEntry(path.to_path_buf()))
        }
    }
}

impl Default for CoreDirectoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryIndexOperations for CoreDirectoryIndex {
    fn list_children(&self, path: &Path) -> Result<Vec<FileNode>> {
        let metadata = fs::metadata(path).map_err(|e| FileSystemError::from_io(path, e))?;
        if !metadata.is_dir() {
            return Err(FileSystemError::NotADirectory(path.to_path_buf()));
        }

        let mut nodes = Vec::new();
        for entry_result in fs::read_dir(path).map_err(|e| FileSystemError::from_io(path, e))? {
            let entry = entry_result.map_err(|e| FileSystemError::from_io(path, e))?;
            let child_path = path.join(entry.file_name());

            // `fs::metadata` follows links, so a link to a directory lists as one.
            let kind = match fs::metadata(&child_path) {
                Ok(child_metadata) => match Self::kind_from_metadata(&child_path, &child_metadata)
                {
                    Ok(kind) => kind,
                    Err(_) => {
                        log::trace!("DirectoryIndex: Skipping special entry {child_path:?}");
                        continue;
                    }
                },
                Err(e) => {
                    log::warn!("DirectoryIndex: Skipping unreadable entry {child_path:?}: {e}");
                    continue;
                }
            };

            if self.is_excluded(&child_path, kind == NodeKind::Directory) {
                log::trace!("DirectoryIndex: Excluded {child_path:?}");
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            nodes.push(FileNode::new(child_path, name, kind));
        }

        sort_file_nodes(&mut nodes);
        log::trace!(
            "DirectoryIndex: Listed {} entries under {:?}",
            nodes.len(),
            path
        );
        Ok(nodes)
    }

    fn stat(&self, path: &Path) -> Result<NodeKind> {
        let metadata = fs::metadata(path).map_err(|e| FileSystemError::from_io(path, e))?;
        Self::kind_from_metadata(path, &metadata)
    }

    fn real_path(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).map_err(|e| FileSystemError::from_io(path, e))
    }
}
