/*
 * Path helpers shared by the core. `normalize_path` produces the canonical
 * key form used by the selection set, and `get_base_app_config_local_dir`
 * locates (and creates) the per-user directory that holds the config file
 * and the log file.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Component, Path, PathBuf};

/*
 * Turns `path` into an absolute, lexically normalized path.
 * Relative paths are joined onto `base`. `.` components are dropped and `..`
 * pops the previous component; a `..` at the root is discarded. Symbolic links
 * are left untouched: a link keeps the path it was reached through, so the
 * same key is produced whether or not the target exists.
 */
pub fn normalize_path(path: &Path, base: &Path) -> PathBuf {
    let joined;
    let absolute = if path.is_absolute() {
        path
    } else {
        joined = base.join(path);
        joined.as_path()
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                normalized.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if normalized.parent().is_some() {
                    normalized.pop();
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/*
 * Retrieves the application's local configuration directory, creating it if
 * necessary. Returns `None` if `ProjectDirs` cannot determine a location or the
 * directory cannot be created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!("PathUtils: Failed to create config directory {config_path:?}: {e}");
                return None;
            }
            log::debug!("PathUtils: Created config directory {config_path:?}");
        }
        Some(config_path.to_path_buf())
    })
}
