use crate::core::{
    ArchiverOperations, FileNode, NodeKind, SelectionChange, SelectionTree,
    TokenEstimatorOperations,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Receiver;

pub(crate) const APP_NAME: &str = "SourcePicker";

pub(crate) const HELP_LINES: &[&str] = &[
    "ls [PATH]       list a directory ([x] marks selected entries)",
    "files           list every file under the root",
    "toggle PATH     select or deselect a file or directory",
    "status          show the selected paths",
    "resolve         show the files the selection resolves to",
    "export [FILE]   concatenate the resolved files (to FILE, or to the screen)",
    "clear           deselect everything",
    "help            show this text",
    "quit            leave",
];

/*
 * One line of user input, parsed. Path arguments take the whole rest of the
 * line so names containing spaces need no quoting.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerCommand {
    List(Option<PathBuf>),
    Files,
    Toggle(PathBuf),
    Status,
    Resolve,
    Export(Option<PathBuf>),
    Clear,
    Help,
    Quit,
}

impl PickerCommand {
    /*
     * Parses a command line. Returns `Ok(None)` for a blank line and an error
     * message for anything unrecognised.
     */
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let argument = (!rest.is_empty()).then(|| PathBuf::from(rest));

        let command = match verb {
            "ls" | "list" => PickerCommand::List(argument),
            "files" => PickerCommand::Files,
            "toggle" | "t" => match argument {
                Some(path) => PickerCommand::Toggle(path),
                None => return Err("toggle needs a path".to_string()),
            },
            "status" => PickerCommand::Status,
            "resolve" => PickerCommand::Resolve,
            "export" => PickerCommand::Export(argument),
            "clear" => PickerCommand::Clear,
            "help" | "?" => PickerCommand::Help,
            "quit" | "exit" | "q" => PickerCommand::Quit,
            other => return Err(format!("Unknown command '{other}'. Type 'help'.")),
        };
        Ok(Some(command))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Continue(Vec<String>),
    Quit,
}

/*
 * The console presenter. It turns commands into calls on the `SelectionTree`
 * and renders the results as text lines. It holds a subscription to the
 * tree's change notifications and reports how many nodes each mutation
 * touched, which is what a graphical renderer would refresh.
 */
pub struct PickerCommandHandler {
    tree: Arc<SelectionTree>,
    archiver: Arc<dyn ArchiverOperations>,
    token_estimator: Arc<dyn TokenEstimatorOperations>,
    changes: Receiver<SelectionChange>,
    default_archive_path: Option<PathBuf>,
}

impl PickerCommandHandler {
    pub fn new(
        tree: Arc<SelectionTree>,
        archiver: Arc<dyn ArchiverOperations>,
        token_estimator: Arc<dyn TokenEstimatorOperations>,
        default_archive_path: Option<PathBuf>,
    ) -> Self {
        let changes = tree.subscribe();
        PickerCommandHandler {
            tree,
            archiver,
            token_estimator,
            changes,
            default_archive_path,
        }
    }

    pub fn handle_line(&self, line: &str) -> HandlerOutcome {
        match PickerCommand::parse(line) {
            Ok(Some(PickerCommand::Quit)) => HandlerOutcome::Quit,
            Ok(Some(command)) => HandlerOutcome::Continue(self.execute(command)),
            Ok(None) => HandlerOutcome::Continue(Vec::new()),
            Err(message) => HandlerOutcome::Continue(vec![message]),
        }
    }

    fn execute(&self, command: PickerCommand) -> Vec<String> {
        log::debug!("AppLogic: Executing {command:?}");
        match command {
            PickerCommand::List(path) => self.on_list(path.as_deref()),
            PickerCommand::Files => self.on_files(),
            PickerCommand::Toggle(path) => self.on_toggle(&path),
            PickerCommand::Status => self.on_status(),
            PickerCommand::Resolve => self.on_resolve(),
            PickerCommand::Export(path) => self.on_export(path),
            PickerCommand::Clear => {
                self.tree.clear();
                vec![format!(
                    "Selection cleared ({} nodes to refresh).",
                    affected_count(&self.drain_changes())
                )]
            }
            PickerCommand::Help => HELP_LINES.iter().map(|l| l.to_string()).collect(),
            PickerCommand::Quit => Vec::new(),
        }
    }

    fn display_path(&self, path: &Path) -> String {
        match path.strip_prefix(self.tree.root()) {
            Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Ok(relative) => relative.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }

    fn render_node(&self, node: &FileNode) -> String {
        let marker = if self.tree.is_selected(node.path()) {
            "[x]"
        } else {
            "[ ]"
        };
        let suffix = match node.kind() {
            NodeKind::Directory => "/",
            NodeKind::File => "",
        };
        format!("{marker} {}{suffix}", node.name())
    }

    fn on_list(&self, path: Option<&Path>) -> Vec<String> {
        match self.tree.get_children(path) {
            Ok(nodes) if nodes.is_empty() => vec!["(empty)".to_string()],
            Ok(nodes) => nodes.iter().map(|node| self.render_node(node)).collect(),
            Err(e) => {
                log::warn!("AppLogic: Listing failed: {e}");
                vec![format!("Cannot read directory: {e}")]
            }
        }
    }

    /// Reports the state carried by this toggle's own change event.
    fn on_toggle(&self, path: &Path) -> Vec<String> {
        if let Err(e) = self.tree.toggle(path) {
            return vec![format!("Cannot toggle: {e}")];
        }
        let path = self.tree.normalize(path);
        let changes = self.drain_changes();
        let selected = changes
            .iter()
            .rev()
            .find_map(|change| match change {
                SelectionChange::Toggled {
                    path: changed,
                    selected,
                    ..
                } if *changed == path => Some(*selected),
                _ => None,
            })
            .unwrap_or_else(|| self.tree.is_selected(&path));
        let verb = if selected { "Selected" } else { "Deselected" };
        vec![format!(
            "{verb} {} ({} nodes to refresh).",
            self.display_path(&path),
            affected_count(&changes)
        )]
    }

    /*
     * Flat view of every file under the root, in path order, with the same
     * markers as `ls`. Directories that cannot be read are listed as skipped.
     */
    fn on_files(&self) -> Vec<String> {
        let listing = self.tree.all_files();
        if listing.files.is_empty() && listing.skipped.is_empty() {
            return vec!["No files found under the root.".to_string()];
        }

        let mut selected = 0;
        let mut lines: Vec<String> = listing
            .files
            .iter()
            .map(|path| {
                let marker = if self.tree.is_selected(path) {
                    selected += 1;
                    "[x]"
                } else {
                    "[ ]"
                };
                format!("{marker} {}", self.display_path(path))
            })
            .collect();
        lines.extend(
            listing
                .skipped
                .iter()
                .map(|path| format!("skipped: {}", self.display_path(path))),
        );
        lines.push(format!(
            "{} files, {selected} selected.",
            listing.files.len()
        ));
        lines
    }

    fn on_status(&self) -> Vec<String> {
        let selected = self.tree.selected_paths();
        let mut lines = vec![format!("{} paths selected.", selected.len())];
        lines.extend(
            selected
                .iter()
                .map(|path| format!("  {}", self.display_path(path))),
        );
        lines
    }

    fn on_resolve(&self) -> Vec<String> {
        let resolved = self.tree.resolve_selection();
        let mut lines: Vec<String> = resolved
            .files
            .iter()
            .map(|path| self.display_path(path))
            .collect();
        lines.extend(
            resolved
                .skipped
                .iter()
                .map(|path| format!("skipped: {}", self.display_path(path))),
        );
        lines.push(format!(
            "{} files, {} skipped.",
            resolved.files.len(),
            resolved.skipped.len()
        ));
        lines
    }

    fn on_export(&self, path: Option<PathBuf>) -> Vec<String> {
        let resolved = self.tree.resolve_selection();
        if resolved.files.is_empty() {
            return vec!["Nothing to export: no files selected.".to_string()];
        }

        let archive = self
            .archiver
            .create_archive_content(&resolved.files, self.tree.root());
        let tokens = self.token_estimator.estimate(&archive.text);

        let mut lines = Vec::new();
        let destination = path
            .map(|p| self.tree.normalize(&p))
            .or_else(|| self.default_archive_path.clone());
        match destination {
            Some(destination) => {
                if let Err(e) = self
                    .archiver
                    .save_archive_content(&destination, &archive.text)
                {
                    log::error!("AppLogic: Failed to write archive {destination:?}: {e}");
                    return vec![format!("Cannot write {}: {e}", destination.display())];
                }
                lines.push(format!(
                    "Wrote {} files (~{tokens} tokens) to {}.",
                    archive.included.len(),
                    destination.display()
                ));
            }
            None => {
                lines.extend(archive.text.lines().map(str::to_string));
                lines.push(format!(
                    "{} files (~{tokens} tokens).",
                    archive.included.len()
                ));
            }
        }

        for path in &resolved.skipped {
            lines.push(format!("skipped: {}", self.display_path(path)));
        }
        for failure in &archive.failed {
            lines.push(format!("not exported: {failure}"));
        }
        lines
    }

    fn drain_changes(&self) -> Vec<SelectionChange> {
        self.changes.try_iter().collect()
    }
}

fn affected_count(changes: &[SelectionChange]) -> usize {
    changes.iter().map(|change| change.affected().len()).sum()
}
