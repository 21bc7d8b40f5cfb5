/*
 * The selection engine. `SelectionTree` owns the set of selected paths and the
 * two operations that give it meaning: `toggle`, which flips a file or (under
 * the deep policy) a whole subtree, and `resolve_selection`, which flattens a
 * mixed file/directory selection into a duplicate-free list of files.
 *
 * Nothing about the tree is cached. Every walk asks the `DirectoryIndexOperations`
 * for one directory at a time from an explicit worklist, and records the real
 * path of each expanded directory so symbolic-link cycles are pruned instead of
 * followed forever.
 */
use super::file_node::{FileNode, NodeKind};
use super::file_system::{DirectoryIndexOperations, FileSystemError, Result};
use super::path_utils::normalize_path;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/*
 * How toggling a directory affects its descendants. The policy is fixed when
 * the engine is built and applies to every toggle.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryPolicy {
    /// The directory and every descendant present at toggle time flip together.
    #[default]
    Deep,
    /// Only the directory's own membership flips.
    Shallow,
}

/*
 * Emitted to subscribers after every successful mutation. `affected` lists
 * every path whose marker may have changed (the toggled path plus, for a deep
 * toggle, its whole walked subtree), so a renderer can refresh just those
 * nodes.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Toggled {
        path: PathBuf,
        selected: bool,
        affected: Vec<PathBuf>,
    },
    Cleared {
        affected: Vec<PathBuf>,
    },
}

impl SelectionChange {
    pub fn affected(&self) -> &[PathBuf] {
        match self {
            SelectionChange::Toggled { affected, .. } | SelectionChange::Cleared { affected } => {
                affected
            }
        }
    }
}

/*
 * Result of resolving the selection. `files` is sorted and holds each file
 * once; `skipped` lists selected paths (or directories beneath them) that
 * could no longer be read. `SelectionTree::all_files` returns the same shape
 * for the whole root.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub files: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkErrorPolicy {
    Abort,
    Skip,
}

/*
 * Iterative depth-first walk over directories reached through the index.
 * `visited_dirs` holds real paths and outlives a single `descendants` call, so
 * one walker shared across several roots expands each real directory once.
 */
struct SubtreeWalker<'a> {
    index: &'a dyn DirectoryIndexOperations,
    on_error: WalkErrorPolicy,
    visited_dirs: HashSet<PathBuf>,
    skipped: Vec<PathBuf>,
}

impl<'a> SubtreeWalker<'a> {
    fn new(index: &'a dyn DirectoryIndexOperations, on_error: WalkErrorPolicy) -> Self {
        SubtreeWalker {
            index,
            on_error,
            visited_dirs: HashSet::new(),
            skipped: Vec::new(),
        }
    }

    /*
     * Returns every entry beneath the directory `root`, excluding `root`
     * itself. A directory whose real path was already expanded is still
     * returned as an entry but not descended into.
     */
    fn descendants(&mut self, root: &Path) -> Result<Vec<FileNode>> {
        let mut found = Vec::new();
        let mut worklist = vec![root.to_path_buf()];

        while let Some(dir) = worklist.pop() {
            let real_dir = match self.index.real_path(&dir) {
                Ok(real_dir) => real_dir,
                Err(e) => {
                    self.handle_error(e)?;
                    continue;
                }
            };
            if !self.visited_dirs.insert(real_dir) {
                log::debug!("SelectionTree: Pruned already-visited directory {dir:?}");
                continue;
            }

            let children = match self.index.list_children(&dir) {
                Ok(children) => children,
                Err(e) => {
                    self.handle_error(e)?;
                    continue;
                }
            };
            for child in children.iter().rev() {
                if child.is_dir() {
                    worklist.push(child.path().to_path_buf());
                }
            }
            found.extend(children);
        }
        Ok(found)
    }

    fn handle_error(&mut self, err: FileSystemError) -> Result<()> {
        match self.on_error {
            WalkErrorPolicy::Abort => Err(err),
            WalkErrorPolicy::Skip => {
                log::warn!("SelectionTree: Skipping {:?}: {err}", err.path());
                self.skipped.push(err.path().to_path_buf());
                Ok(())
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}

/*
 * Owns the selection for one browsing session rooted at `root`.
 *
 * `toggle`, `resolve_selection` and `clear` run one at a time behind
 * `operation_lock`. The set itself sits behind an `RwLock` that is only held
 * for the instant a finished change is applied, so `is_selected` never waits
 * for a walk in progress. A toggle's walk completes before anything is
 * written; if it fails, the set is untouched.
 */
pub struct SelectionTree {
    root: PathBuf,
    policy: DirectoryPolicy,
    index: Arc<dyn DirectoryIndexOperations>,
    selected: RwLock<HashSet<PathBuf>>,
    operation_lock: Mutex<()>,
    subscribers: Mutex<Vec<Sender<SelectionChange>>>,
}

impl SelectionTree {
    pub fn new(
        root: &Path,
        policy: DirectoryPolicy,
        index: Arc<dyn DirectoryIndexOperations>,
    ) -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        let root = normalize_path(root, &cwd);
        log::debug!("SelectionTree: Created for {root:?} with {policy:?} directory policy");
        SelectionTree {
            root,
            policy,
            index,
            selected: RwLock::new(HashSet::new()),
            operation_lock: Mutex::new(()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> DirectoryPolicy {
        self.policy
    }

    /// Absolute, normalized form of `path`; relative paths are taken from the root.
    pub fn normalize(&self, path: &Path) -> PathBuf {
        normalize_path(path, &self.root)
    }

    /*
     * Lists the children of `path`, or of the root when `path` is `None`.
     * Errors from the index are returned untouched.
     */
    pub fn get_children(&self, path: Option<&Path>) -> Result<Vec<FileNode>> {
        let dir = match path {
            Some(path) => self.normalize(path),
            None => self.root.clone(),
        };
        self.index.list_children(&dir)
    }

    pub fn is_selected(&self, path: &Path) -> bool {
        read(&self.selected).contains(&self.normalize(path))
    }

    #[cfg(test)]
    pub fn selected_count(&self) -> usize {
        read(&self.selected).len()
    }

    /// Sorted snapshot of the selected paths, files and directories alike.
    pub fn selected_paths(&self) -> Vec<PathBuf> {
        let selected = read(&self.selected);
        let sorted: BTreeSet<&PathBuf> = selected.iter().collect();
        sorted.into_iter().cloned().collect()
    }

    /*
     * Returns a receiver that gets one `SelectionChange` per successful
     * `toggle` or `clear`. Dropping the receiver unsubscribes.
     */
    pub fn subscribe(&self) -> Receiver<SelectionChange> {
        let (sender, receiver) = mpsc::channel();
        lock(&self.subscribers).push(sender);
        receiver
    }

    /*
     * Flips the selection of `path`. A file, or a directory under the shallow
     * policy, flips alone. Under the deep policy a directory flips together with
     * every descendant found by walking it, and deselecting also drops any
     * selected path lexically beneath it that no longer exists on disk.
     *
     * On error the selection is unchanged and no notification is sent.
     */
    pub fn toggle(&self, path: &Path) -> Result<()> {
        let path = self.normalize(path);
        let _operation = lock(&self.operation_lock);

        let kind = self.index.stat(&path)?;
        let deep = kind == NodeKind::Directory && self.policy == DirectoryPolicy::Deep;

        let mut affected = vec![path.clone()];
        if deep {
            let mut walker = SubtreeWalker::new(self.index.as_ref(), WalkErrorPolicy::Abort);
            let descendants = walker
                .descendants(&path)
                .inspect_err(|e| log::warn!("SelectionTree: Toggle of {path:?} rolled back: {e}"))?;
            affected.extend(descendants.into_iter().map(|node| node.path().to_path_buf()));
        }

        let now_selected = {
            let mut selected = write(&self.selected);
            if selected.contains(&path) {
                for p in &affected {
                    selected.remove(p);
                }
                if deep {
                    let mut stale = Vec::new();
                    selected.retain(|p| {
                        let beneath = p.starts_with(&path);
                        if beneath {
                            stale.push(p.clone());
                        }
                        !beneath
                    });
                    affected.extend(stale);
                }
                false
            } else {
                selected.extend(affected.iter().cloned());
                true
            }
        };

        log::debug!(
            "SelectionTree: Toggled {:?} to {} ({} paths affected)",
            path,
            if now_selected { "selected" } else { "deselected" },
            affected.len()
        );
        self.notify(SelectionChange::Toggled {
            path,
            selected: now_selected,
            affected,
        });
        Ok(())
    }

    /*
     * Flattens the selection into files. Selected files are taken as they are;
     * selected directories contribute every file beneath them. Each file appears
     * once even when reachable through several selected ancestors or through a
     * symbolic link, under the first path it was reached by (selected paths are
     * processed in sorted order). Paths that cannot be read are reported in
     * `skipped` and never abort the resolution.
     */
    pub fn resolve_selection(&self) -> ResolvedSelection {
        let _operation = lock(&self.operation_lock);
        let roots: BTreeSet<PathBuf> = read(&self.selected).iter().cloned().collect();

        let mut walker = SubtreeWalker::new(self.index.as_ref(), WalkErrorPolicy::Skip);
        let mut seen_files: HashSet<PathBuf> = HashSet::new();
        let mut files = Vec::new();
        let mut skipped = Vec::new();

        let mut add_file = |path: &Path, skipped: &mut Vec<PathBuf>| match self
            .index
            .real_path(path)
        {
            Ok(real) => {
                if seen_files.insert(real) {
                    files.push(path.to_path_buf());
                }
            }
            Err(e) => {
                log::warn!("SelectionTree: Skipping {path:?}: {e}");
                skipped.push(path.to_path_buf());
            }
        };

        for root in &roots {
            match self.index.stat(root) {
                Ok(NodeKind::File) => add_file(root, &mut skipped),
                Ok(NodeKind::Directory) => {
                    // Skip policy: the walker records failures instead of returning them.
                    let descendants = walker.descendants(root).unwrap_or_default();
                    for node in descendants.iter().filter(|node| !node.is_dir()) {
                        add_file(node.path(), &mut skipped);
                    }
                }
                Err(e) => {
                    log::warn!("SelectionTree: Selected path {root:?} skipped: {e}");
                    skipped.push(root.clone());
                }
            }
        }
        skipped.append(&mut walker.skipped);

        files.sort();
        skipped.sort();
        skipped.dedup();
        log::debug!(
            "SelectionTree: Resolved {} selected paths to {} files ({} skipped)",
            roots.len(),
            files.len(),
            skipped.len()
        );
        ResolvedSelection { files, skipped }
    }

    /*
     * Every file beneath the root, regardless of selection, in path order.
     * Uses the same cycle-pruned walk as `resolve_selection`; unreadable
     * directories end up in `skipped`. Files are listed under every lexical
     * path they are reachable by, since this is a view of entries rather
     * than an export.
     */
    pub fn all_files(&self) -> ResolvedSelection {
        let mut walker = SubtreeWalker::new(self.index.as_ref(), WalkErrorPolicy::Skip);
        let mut files: Vec<PathBuf> = walker
            .descendants(&self.root)
            .unwrap_or_default()
            .into_iter()
            .filter(|node| !node.is_dir())
            .map(|node| node.path().to_path_buf())
            .collect();
        files.sort();

        let mut skipped = walker.skipped;
        skipped.sort();
        skipped.dedup();
        log::debug!(
            "SelectionTree: Listed {} files under {:?} ({} skipped)",
            files.len(),
            self.root,
            skipped.len()
        );
        ResolvedSelection { files, skipped }
    }

    pub fn clear(&self) {
        let _operation = lock(&self.operation_lock);
        let affected: Vec<PathBuf> = write(&self.selected).drain().collect();
        log::debug!("SelectionTree: Cleared {} selected paths", affected.len());
        self.notify(SelectionChange::Cleared { affected });
    }

    fn notify(&self, change: SelectionChange) {
        lock(&self.subscribers).retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_system::CoreDirectoryIndex;
    use std::fs::{self, File};
    use std::thread;
    use tempfile::{TempDir, tempdir};

    /*
     * Wraps the real index and fails `list_children` with `PermissionDenied`
     * for any directory registered in `deny_listing`.
     */
    struct DenyingDirectoryIndex {
        inner: CoreDirectoryIndex,
        deny_listing: Mutex<HashSet<PathBuf>>,
        list_calls: Mutex<Vec<PathBuf>>,
    }

    impl DenyingDirectoryIndex {
        fn new() -> Self {
            DenyingDirectoryIndex {
                inner: CoreDirectoryIndex::new(),
                deny_listing: Mutex::new(HashSet::new()),
                list_calls: Mutex::new(Vec::new()),
            }
        }

        fn deny(&self, path: &Path) {
            self.deny_listing.lock().unwrap().insert(path.to_path_buf());
        }
    }

    impl DirectoryIndexOperations for DenyingDirectoryIndex {
        fn list_children(&self, path: &Path) -> Result<Vec<FileNode>> {
            self.list_calls.lock().unwrap().push(path.to_path_buf());
            if self.deny_listing.lock().unwrap().contains(path) {
                return Err(FileSystemError::PermissionDenied(path.to_path_buf()));
            }
            self.inner.list_children(path)
        }

        fn stat(&self, path: &Path) -> Result<NodeKind> {
            self.inner.stat(path)
        }

        fn real_path(&self, path: &Path) -> Result<PathBuf> {
            self.inner.real_path(path)
        }
    }

    // D/{a.txt, b.txt, E/c.txt} plus a sibling top.txt.
    fn setup_tree() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("D").join("E")).unwrap();
        fs::write(root.join("D/a.txt"), "a").unwrap();
        fs::write(root.join("D/b.txt"), "b").unwrap();
        fs::write(root.join("D/E/c.txt"), "c").unwrap();
        File::create(root.join("top.txt")).unwrap();
        (dir, root)
    }

    fn new_tree(root: &Path, policy: DirectoryPolicy) -> SelectionTree {
        SelectionTree::new(root, policy, Arc::new(CoreDirectoryIndex::new()))
    }

    #[test]
    fn test_toggle_file_twice_restores_selection() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);
        tree.toggle(&root.join("top.txt")).unwrap();
        let before = tree.selected_paths();

        tree.toggle(&root.join("D/a.txt")).unwrap();
        assert!(tree.is_selected(&root.join("D/a.txt")));
        tree.toggle(&root.join("D/a.txt")).unwrap();

        assert_eq!(tree.selected_paths(), before);
    }

    #[test]
    fn test_deep_toggle_selects_and_deselects_whole_subtree() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);

        tree.toggle(&root.join("D")).unwrap();
        assert!(tree.is_selected(&root.join("D/E")));
        assert!(tree.is_selected(&root.join("D/E/c.txt")));
        assert!(!tree.is_selected(&root.join("top.txt")));

        let resolved = tree.resolve_selection();
        assert_eq!(
            resolved.files,
            vec![
                root.join("D/E/c.txt"),
                root.join("D/a.txt"),
                root.join("D/b.txt")
            ]
        );
        assert!(resolved.skipped.is_empty());

        tree.toggle(&root.join("D")).unwrap();
        assert_eq!(tree.selected_count(), 0);
        assert_eq!(tree.resolve_selection(), ResolvedSelection::default());
    }

    #[test]
    fn test_file_selected_directly_and_through_parent_resolves_once() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);

        tree.toggle(&root.join("D/a.txt")).unwrap();
        tree.toggle(&root.join("D")).unwrap();

        let resolved = tree.resolve_selection();
        let count = resolved
            .files
            .iter()
            .filter(|f| **f == root.join("D/a.txt"))
            .count();
        assert_eq!(count, 1);
        assert_eq!(resolved.files.len(), 3);
    }

    #[test]
    fn test_deleted_file_is_skipped_not_fatal() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);
        let a = root.join("D/a.txt");
        let b = root.join("D/b.txt");
        tree.toggle(&a).unwrap();
        tree.toggle(&b).unwrap();

        fs::remove_file(&b).unwrap();

        let resolved = tree.resolve_selection();
        assert_eq!(resolved.files, vec![a]);
        assert_eq!(resolved.skipped, vec![b]);
    }

    #[test]
    fn test_empty_selection_resolves_to_nothing() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);
        let resolved = tree.resolve_selection();
        assert!(resolved.files.is_empty());
        assert!(resolved.skipped.is_empty());
    }

    #[test]
    fn test_failed_walk_rolls_back_toggle() {
        let (_dir, root) = setup_tree();
        let index = Arc::new(DenyingDirectoryIndex::new());
        let tree = SelectionTree::new(&root, DirectoryPolicy::Deep, index.clone());
        tree.toggle(&root.join("top.txt")).unwrap();
        tree.toggle(&root.join("D/a.txt")).unwrap();
        let before = tree.selected_paths();
        let changes = tree.subscribe();

        index.deny(&root.join("D/E"));
        let result = tree.toggle(&root.join("D"));

        assert!(matches!(
            result,
            Err(FileSystemError::PermissionDenied(ref p)) if *p == root.join("D/E")
        ));
        assert_eq!(tree.selected_paths(), before);
        assert!(changes.try_recv().is_err());
        assert!(
            index
                .list_calls
                .lock()
                .unwrap()
                .contains(&root.join("D/E"))
        );
    }

    #[test]
    fn test_unreadable_directory_is_skipped_during_resolve() {
        let (_dir, root) = setup_tree();
        let index = Arc::new(DenyingDirectoryIndex::new());
        let tree = SelectionTree::new(&root, DirectoryPolicy::Shallow, index.clone());
        tree.toggle(&root.join("D")).unwrap();

        index.deny(&root.join("D/E"));
        let resolved = tree.resolve_selection();

        assert_eq!(
            resolved.files,
            vec![root.join("D/a.txt"), root.join("D/b.txt")]
        );
        assert_eq!(resolved.skipped, vec![root.join("D/E")]);
    }

    #[test]
    fn test_all_files_lists_whole_root_regardless_of_selection() {
        let (_dir, root) = setup_tree();
        let index = Arc::new(DenyingDirectoryIndex::new());
        let tree = SelectionTree::new(&root, DirectoryPolicy::Deep, index.clone());
        tree.toggle(&root.join("top.txt")).unwrap();

        let listing = tree.all_files();
        assert_eq!(
            listing.files,
            vec![
                root.join("D/E/c.txt"),
                root.join("D/a.txt"),
                root.join("D/b.txt"),
                root.join("top.txt"),
            ]
        );
        assert!(listing.skipped.is_empty());
        assert_eq!(tree.selected_count(), 1);

        index.deny(&root.join("D/E"));
        let listing = tree.all_files();
        assert_eq!(listing.files.len(), 3);
        assert_eq!(listing.skipped, vec![root.join("D/E")]);
    }

    #[test]
    fn test_toggle_missing_path_fails_without_change() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);
        let missing = root.join("nope.txt");

        assert!(matches!(
            tree.toggle(&missing),
            Err(FileSystemError::NotFound(ref p)) if *p == missing
        ));
        assert_eq!(tree.selected_count(), 0);
    }

    #[test]
    fn test_shallow_policy_flips_directory_alone() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Shallow);

        tree.toggle(&root.join("D/a.txt")).unwrap();
        tree.toggle(&root.join("D")).unwrap();
        assert!(tree.is_selected(&root.join("D")));
        assert!(!tree.is_selected(&root.join("D/b.txt")));
        assert_eq!(tree.selected_count(), 2);

        // A selected directory still resolves to all of its files.
        assert_eq!(tree.resolve_selection().files.len(), 3);

        tree.toggle(&root.join("D")).unwrap();
        assert_eq!(tree.selected_paths(), vec![root.join("D/a.txt")]);
    }

    #[test]
    fn test_deep_deselect_drops_entries_that_vanished() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);
        tree.toggle(&root.join("D")).unwrap();
        fs::remove_dir_all(root.join("D/E")).unwrap();

        tree.toggle(&root.join("D")).unwrap();

        assert_eq!(tree.selected_count(), 0);
    }

    #[test]
    fn test_relative_paths_are_taken_from_root() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);

        tree.toggle(Path::new("D/./a.txt")).unwrap();

        assert!(tree.is_selected(&root.join("D/a.txt")));
        assert!(tree.is_selected(Path::new("D/a.txt")));
        let names: Vec<String> = tree
            .get_children(None)
            .unwrap()
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        assert_eq!(names, vec!["D", "top.txt"]);
        assert_eq!(tree.get_children(Some(Path::new("D/E"))).unwrap().len(), 1);
    }

    #[test]
    fn test_get_children_propagates_errors() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);
        assert!(matches!(
            tree.get_children(Some(Path::new("top.txt"))),
            Err(FileSystemError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_subscribers_see_each_mutation() {
        let (_dir, root) = setup_tree();
        let tree = new_tree(&root, DirectoryPolicy::Deep);
        let changes = tree.subscribe();

        tree.toggle(&root.join("D/E")).unwrap();
        match changes.try_recv().unwrap() {
            SelectionChange::Toggled {
                path,
                selected,
                affected,
            } => {
                assert_eq!(path, root.join("D/E"));
                assert!(selected);
                assert_eq!(affected, vec![root.join("D/E"), root.join("D/E/c.txt")]);
            }
            other => panic!("unexpected change {other:?}"),
        }

        tree.clear();
        let cleared = changes.try_recv().unwrap();
        assert!(matches!(cleared, SelectionChange::Cleared { .. }));
        assert_eq!(cleared.affected().len(), 2);
        assert_eq!(tree.selected_count(), 0);

        drop(changes);
        // A dropped receiver must not break later notifications.
        tree.toggle(&root.join("top.txt")).unwrap();
    }

    #[test]
    fn test_concurrent_toggles_all_apply() {
        let (_dir, root) = setup_tree();
        let tree = Arc::new(new_tree(&root, DirectoryPolicy::Deep));
        let files = ["D/a.txt", "D/b.txt", "D/E/c.txt", "top.txt"];

        let handles: Vec<_> = files
            .iter()
            .map(|f| {
                let tree = Arc::clone(&tree);
                let path = root.join(f);
                thread::spawn(move || tree.toggle(&path).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tree.selected_count(), files.len());
        assert_eq!(tree.resolve_selection().files.len(), files.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates_and_visits_each_real_path_once() {
        use std::os::unix::fs::symlink;

        let (_dir, root) = setup_tree();
        symlink(root.join("D"), root.join("D/E/back_to_d")).unwrap();
        let index = Arc::new(DenyingDirectoryIndex::new());
        let tree = SelectionTree::new(&root, DirectoryPolicy::Deep, index.clone());

        tree.toggle(&root.join("D")).unwrap();
        assert!(tree.is_selected(&root.join("D/E/back_to_d")));
        let listed = index.list_calls.lock().unwrap().clone();
        let unique: HashSet<&PathBuf> = listed.iter().collect();
        assert_eq!(listed.len(), unique.len());
        assert_eq!(listed.len(), 2);

        let resolved = tree.resolve_selection();
        assert_eq!(resolved.files.len(), 3);
        assert!(resolved.skipped.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_all_files_terminates_on_symlink_cycle() {
        use std::os::unix::fs::symlink;

        let (_dir, root) = setup_tree();
        symlink(&root, root.join("D/E/back_to_root")).unwrap();
        let index = Arc::new(DenyingDirectoryIndex::new());
        let tree = SelectionTree::new(&root, DirectoryPolicy::Deep, index.clone());

        let listing = tree.all_files();

        assert_eq!(listing.files.len(), 4);
        assert_eq!(index.list_calls.lock().unwrap().len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_reachable_through_link_resolves_once() {
        use std::os::unix::fs::symlink;

        let (_dir, root) = setup_tree();
        symlink(root.join("D/a.txt"), root.join("D/a_link.txt")).unwrap();
        let tree = new_tree(&root, DirectoryPolicy::Deep);

        tree.toggle(&root.join("D")).unwrap();
        let resolved = tree.resolve_selection();

        assert!(resolved.files.contains(&root.join("D/a.txt")));
        assert!(!resolved.files.contains(&root.join("D/a_link.txt")));
        assert_eq!(resolved.files.len(), 3);
    }
}
