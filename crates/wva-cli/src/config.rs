//! Configuration file handling for wva-cli

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Configuration for the CLI tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Device hostname (optionally `host:port`)
    pub hostname: Option<String>,
    /// Web services user
    pub username: Option<String>,
    /// Web services password
    pub password: Option<String>,
    /// Use HTTPS (default true)
    pub use_https: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write configuration to `path`, readable only by the owner
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("wva-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments (already resolved against the environment) over
    /// config file values
    pub fn merge_with_args(
        &self,
        hostname: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
        http: bool,
    ) -> MergedConfig {
        MergedConfig {
            hostname: hostname.map(String::from).or_else(|| self.hostname.clone()),
            username: username.map(String::from).or_else(|| self.username.clone()),
            password: password.map(String::from).or_else(|| self.password.clone()),
            use_https: !http && self.use_https.unwrap_or(true),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_https: bool,
}

impl MergedConfig {
    /// Config file contents that reproduce this configuration
    pub fn to_config(&self) -> Config {
        Config {
            hostname: self.hostname.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            use_https: Some(self.use_https),
        }
    }
}
