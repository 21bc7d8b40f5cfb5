/*
 * Turns a resolved file list into one text archive. This is the export side of
 * the picker: it is handed paths only and knows nothing about how they were
 * selected. Each file is framed by START/END header lines carrying its path
 * relative to the browsed root.
 */
use crate::core::file_system::FileSystemError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/*
 * Outcome of building an archive. Files that could not be read are listed in
 * `failed` and left out of `text`, so one unreadable file does not cost the
 * user the rest of the export.
 */
#[derive(Debug, Default)]
pub struct ArchiveContent {
    pub text: String,
    pub included: Vec<PathBuf>,
    pub failed: Vec<FileSystemError>,
}

pub trait ArchiverOperations: Send + Sync {
    fn create_archive_content(&self, files: &[PathBuf], root_path_for_display: &Path)
    -> ArchiveContent;
    fn save_archive_content(&self, path: &Path, content: &str) -> io::Result<()>;
}

pub struct CoreArchiver {}

impl CoreArchiver {
    pub fn new() -> Self {
        CoreArchiver {}
    }

    fn read_text(path: &Path) -> Result<String, FileSystemError> {
        let metadata = fs::metadata(path).map_err(|e| FileSystemError::from_io(path, e))?;
        if !metadata.is_file() {
            return Err(FileSystemError::NotAFile(path.to_path_buf()));
        }
        fs::read_to_string(path).map_err(|e| FileSystemError::from_io(path, e))
    }
}

impl Default for CoreArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiverOperations for CoreArchiver {
    fn create_archive_content(
        &self,
        files: &[PathBuf],
        root_path_for_display: &Path,
    ) -> ArchiveContent {
        let mut archive = ArchiveContent::default();

        for path in files {
            let content = match Self::read_text(path) {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("CoreArchiver: Leaving {path:?} out of the archive: {e}");
                    archive.failed.push(e);
                    continue;
                }
            };

            let display_path = path
                .strip_prefix(root_path_for_display)
                .unwrap_or(path)
                .to_string_lossy();

            archive
                .text
                .push_str(&format!("--- START FILE: {display_path} ---\n"));
            archive.text.push_str(&content);
            if !content.ends_with('\n') {
                archive.text.push('\n');
            }
            archive
                .text
                .push_str(&format!("--- END FILE: {display_path} ---\n\n"));
            archive.included.push(path.clone());
        }

        log::debug!(
            "CoreArchiver: Archived {} files ({} failed, {} bytes)",
            archive.included.len(),
            archive.failed.len(),
            archive.text.len()
        );
        archive
    }

    fn save_archive_content(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        log::debug!("CoreArchiver: Wrote archive to {path:?}");
        Ok(())
    }
}
