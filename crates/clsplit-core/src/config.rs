//! Configuration for clustering and reviewer-search limits.
//!
//! Load order: `.clsplit.toml` → environment variables → defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level clsplit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Bins below this file count are merged into their parent directory
    /// when the change overflows there.
    pub min_files: usize,
    /// Bins are not allowed to grow past this file count.
    pub max_files: usize,
    /// Hard cap on owner combinations examined per reviewer search.
    /// When hit, the search returns the best partial cover found so far.
    pub max_combinations: usize,
    /// Worker threads for batch owner resolution.
    pub batch_workers: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            min_files: 5,
            max_files: 10,
            max_combinations: 1_000_000,
            batch_workers: 8,
        }
    }
}

const CONFIG_FILE: &str = ".clsplit.toml";

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl SplitConfig {
    /// Load config from `.clsplit.toml` in the repository root, with env var
    /// overrides. Falls back to defaults if no config file exists.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        // Environment variable overrides
        env_override("CLSPLIT_MIN_FILES", &mut config.min_files);
        env_override("CLSPLIT_MAX_FILES", &mut config.max_files);
        env_override("CLSPLIT_MAX_COMBINATIONS", &mut config.max_combinations);
        env_override("CLSPLIT_BATCH_WORKERS", &mut config.batch_workers);

        config.validate()?;
        Ok(config)
    }

    /// Check that the size bounds make sense together.
    pub fn validate(&self) -> Result<()> {
        if self.min_files == 0 {
            anyhow::bail!("min_files must be at least 1");
        }
        if self.min_files > self.max_files {
            anyhow::bail!(
                "min_files ({}) must not exceed max_files ({})",
                self.min_files,
                self.max_files,
            );
        }
        if self.batch_workers == 0 {
            anyhow::bail!("batch_workers must be at least 1");
        }
        Ok(())
    }
}
