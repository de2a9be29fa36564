// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine settings, stored as RON.

use crate::graph::{Position, DEFAULT_DUPLICATE_OFFSET, DEFAULT_GRAPH_NAME};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Error reading or writing engine settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON for the settings format
    #[error("Invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be encoded
    #[error("Cannot encode settings: {0}")]
    Encode(#[from] ron::Error),

    /// File was written by a newer version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Settings format version
    pub version: u32,
    /// Name for new and unnamed graphs
    pub default_graph_name: String,
    /// Offset applied to duplicated nodes
    pub duplicate_offset: Position,
    /// Default `tracing` filter directive
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            default_graph_name: DEFAULT_GRAPH_NAME.to_string(),
            duplicate_offset: DEFAULT_DUPLICATE_OFFSET,
            log_filter: "livegraph=info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse settings from RON text; missing fields take their defaults
    pub fn from_ron(text: &str) -> Result<Self, ConfigFileError> {
        let config: EngineConfig = ron::from_str(text)?;
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigFileError::UnsupportedVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        Ok(config)
    }

    /// Encode as pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigFileError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&text)?;
        tracing::debug!("Loaded engine settings from {}", path.display());
        Ok(config)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}
