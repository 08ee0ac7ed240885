use crate::diagnostics;
use crate::value::MAX_SUBSET_VALUES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tablelib::config::TablesConfig;

fn default_max_subset_values() -> usize {
    MAX_SUBSET_VALUES
}

fn default_diagnostics_capacity() -> usize {
    diagnostics::DEFAULT_CAPACITY
}

/// Decoder settings. Table settings sit at the top level of the file so a
/// plain tables config is also a valid decoder config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(flatten)]
    pub tables: TablesConfig,

    #[serde(default = "default_max_subset_values")]
    pub max_subset_values: usize,

    #[serde(default = "default_diagnostics_capacity")]
    pub diagnostics_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::new(TablesConfig::default())
    }
}

impl DecoderConfig {
    pub fn new(tables: TablesConfig) -> Self {
        DecoderConfig {
            tables,
            max_subset_values: MAX_SUBSET_VALUES,
            diagnostics_capacity: diagnostics::DEFAULT_CAPACITY,
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}
