//! Engine configuration: storage keys, defaults, and seed discovery paths.
//!
//! Every field has a default matching the keys the classroom pages already
//! use, so an empty TOML file (or no file at all) yields a working setup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Number of slots managed by the allocator.
pub const SLOT_COUNT: usize = 7;

/// File name offered when exporting every list.
pub const EXPORT_FILE_NAME: &str = "random-picker-lists.json";

/// Relative locations tried for a seed file, in order.
pub const DEFAULT_SEED_PATHS: [&str; 3] = [
    "../data/random-picker-lists.json",
    "./random-picker-lists.json",
    "../random-picker-lists.json",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration shared by the list store, the allocator, and seed discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Key holding the mapping of list name to entries.
    pub lists_key: String,
    /// Key holding the allocator's slot array.
    pub slots_key: String,
    /// Key holding the name of the allocator's active list.
    pub active_list_key: String,
    /// List the allocator falls back to when the active one is missing.
    pub default_list: String,
    /// Case-insensitive substring identifying lists offered to the allocator.
    pub candidate_keyword: String,
    /// Seed file locations tried by auto-bootstrap, in order.
    pub seed_paths: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lists_key: "randomPickerLists".to_string(),
            slots_key: "sevenPickersState".to_string(),
            active_list_key: "sevenPickersSelectedList".to_string(),
            default_list: "Students 2026".to_string(),
            candidate_keyword: "student".to_string(),
            seed_paths: DEFAULT_SEED_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML; missing fields keep their defaults.
    ///
    /// # Example
    /// ```
    /// use roster_picker::config::EngineConfig;
    ///
    /// let config = EngineConfig::from_toml_str("default_list = \"Room 12\"\n").unwrap();
    /// assert_eq!(config.default_list, "Room 12");
    /// assert_eq!(config.lists_key, "randomPickerLists");
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load a configuration file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
