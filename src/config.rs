//! TOML configuration file
//!
//! # Example why-is-this-slow.toml
//!
//! ```toml
//! state_dir = "/var/tmp/slow-runs"
//!
//! [analysis]
//! high_sys_ratio = 0.30
//! memory_threshold = 1048576
//! ```

use crate::analysis::AnalysisConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Where run records are stored; platform default when unset
    pub state_dir: Option<PathBuf>,

    /// Classifier and rule thresholds
    pub analysis: AnalysisConfig,
}

impl Settings {
    /// Load settings from a TOML file
    ///
    /// ```no_run
    /// use why_is_this_slow::config::Settings;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let settings = Settings::from_file("why-is-this-slow.toml")?;
    /// println!("high sys ratio: {}", settings.analysis.high_sys_ratio);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).context("Failed to parse TOML")?;
        settings
            .analysis
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid [analysis] section")?;
        Ok(settings)
    }

    /// Defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}
