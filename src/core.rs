/*
 * The platform-agnostic core of the picker: the directory index that reads the
 * filesystem one level at a time, the selection engine built on it, and the
 * export helpers (archiver, token estimate) plus configuration. The console
 * front end in `app_logic` only talks to the items re-exported here.
 */
pub mod archiver;
pub mod config;
pub mod file_node;
pub mod file_system;
pub mod path_utils;
pub mod selection_tree;
pub mod token_estimate;

pub use file_node::{FileNode, NodeKind};

pub use file_system::CoreDirectoryIndex;

pub use selection_tree::{DirectoryPolicy, SelectionChange, SelectionTree};

pub use archiver::{ArchiverOperations, CoreArchiver};

pub use config::{ConfigManagerOperations, CoreConfigManager, PickerConfig};

pub use token_estimate::{Cl100kTokenEstimator, TokenEstimatorOperations};
