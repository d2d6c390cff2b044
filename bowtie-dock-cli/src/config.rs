//! Configuration handling for the bowtie-dock CLI
//!
//! Supports loading configuration from bowtie-dock.toml files with CLI argument overrides.

use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bowtie_dock_core::{ContainerLayout, DockerEngineConfig, ImageRef, PollSettings};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "bowtie-dock.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: DockerEngineConfig,

    #[serde(default)]
    pub image: ImageRef,

    #[serde(default)]
    pub container: ContainerLayout,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub aligner: AlignerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between container state checks in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Give up waiting after this many seconds (unset waits forever)
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignerConfig {
    /// Extra bowtie2 options placed before `-x`
    #[serde(default)]
    pub extra_args: Vec<String>,
}

// Default value functions
fn default_interval_ms() -> u64 { 1000 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_wait_secs: None,
        }
    }
}

impl PollConfig {
    pub fn to_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.interval_ms.max(1)),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default configuration")
    }
}
