use std::path::{Path, PathBuf};

/*
 * The kind of a filesystem entry as seen by the picker. Anything that is
 * neither a regular file nor a directory (after following symbolic links)
 * is not represented.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Directory,
}

/*
 * A transient descriptor of one filesystem entry. Nodes are rebuilt on every
 * listing and never cached; the selection set refers to entries by path only,
 * so a node carries no selection state of its own.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    path: PathBuf,
    name: String,
    kind: NodeKind,
}

impl FileNode {
    pub fn new(path: PathBuf, name: String, kind: NodeKind) -> Self {
        FileNode { path, name, kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Orders nodes directories-first, then by name.
pub fn sort_file_nodes(nodes: &mut [FileNode]) {
    nodes.sort_by(|a, b| match (a.is_dir(), b.is_dir()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}
