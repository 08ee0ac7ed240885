use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the table directory.
pub const TABLES_ENV: &str = "BUFR_TABLES";

pub const DEFAULT_TABLES_DIR: &str = "/usr/local/lib/bufrtables";

fn default_tables_dir() -> PathBuf {
    std::env::var_os(TABLES_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TABLES_DIR))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesConfig {
    /// Directory holding the B, C and D text tables
    #[serde(default = "default_tables_dir")]
    pub tables_dir: PathBuf,

    /// Share loaded tables across messages for the lifetime of the process
    #[serde(default)]
    pub use_cache: bool,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl TablesConfig {
    pub fn new<P: Into<PathBuf>>(tables_dir: P) -> Self {
        Self {
            tables_dir: tables_dir.into(),
            use_cache: false,
        }
    }

    pub fn from_env() -> Self {
        Self::new(default_tables_dir())
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
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

    pub fn default_example() -> Self {
        Self::new(DEFAULT_TABLES_DIR).with_cache(true)
    }
}
