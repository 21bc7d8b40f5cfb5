/*
 * Persists the picker's settings: the last browsed root, the directory toggle
 * policy, exclude patterns, and where exports are written. Settings live as
 * JSON in the per-user local configuration directory. The selection itself is
 * never stored; each session starts empty.
 *
 * `ConfigManagerOperations` abstracts the storage so callers can be tested
 * against a fixed directory or a mock.
 */
use crate::core::path_utils;
use crate::core::selection_tree::DirectoryPolicy;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

const CONFIG_FILENAME: &str = "picker_config.json";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoProjectDirectory,
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Configuration file is not valid JSON: {e}"),
            ConfigError::NoProjectDirectory => {
                write!(f, "Could not determine the configuration directory")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/*
 * User settings. Every field has a default so files written by older versions
 * (or edited by hand with fields removed) still load.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    pub last_root: Option<PathBuf>,
    pub directory_policy: DirectoryPolicy,
    pub exclude_patterns: Vec<String>,
    pub archive_path: Option<PathBuf>,
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_config(&self, app_name: &str) -> Result<PickerConfig>;
    fn save_config(&self, app_name: &str, config: &PickerConfig) -> Result<()>;
}

/*
 * File-backed configuration. By default the directory comes from
 * `path_utils::get_base_app_config_local_dir`; `with_config_dir` pins it to a
 * fixed location instead.
 */
pub struct CoreConfigManager {
    config_dir_override: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {
            config_dir_override: None,
        }
    }

    #[cfg(test)]
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        CoreConfigManager {
            config_dir_override: Some(config_dir),
        }
    }

    fn config_file_path(&self, app_name: &str) -> Result<PathBuf> {
        let config_dir = match &self.config_dir_override {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => path_utils::get_base_app_config_local_dir(app_name)
                .ok_or(ConfigError::NoProjectDirectory)?,
        };
        Ok(config_dir.join(CONFIG_FILENAME))
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    /*
     * A missing or blank config file is not an error; it yields the default
     * settings.
     */
    fn load_config(&self, app_name: &str) -> Result<PickerConfig> {
        let file_path = self.config_file_path(app_name)?;
        if !file_path.exists() {
            log::debug!("CoreConfigManager: Config file {file_path:?} does not exist.");
            return Ok(PickerConfig::default());
        }

        let contents = fs::read_to_string(&file_path)?;
        if contents.trim().is_empty() {
            log::debug!("CoreConfigManager: Config file {file_path:?} is empty.");
            return Ok(PickerConfig::default());
        }

        let config: PickerConfig = serde_json::from_str(&contents)?;
        log::debug!("CoreConfigManager: Loaded config from {file_path:?}: {config:?}");
        Ok(config)
    }

    fn save_config(&self, app_name: &str, config: &PickerConfig) -> Result<()> {
        let file_path = self.config_file_path(app_name)?;
        let mut writer = BufWriter::new(File::create(&file_path)?);
        serde_json::to_writer_pretty(&mut writer, config)?;
        writer.flush()?;
        log::debug!("CoreConfigManager: Saved config to {file_path:?}.");
        Ok(())
    }
}
