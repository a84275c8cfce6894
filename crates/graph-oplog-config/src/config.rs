//! TOML configuration for the operation deriver and its host process.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GRAPH_OPLOG_CONFIG";
/// Environment variable overriding the log filter.
pub const LOG_ENV: &str = "GRAPH_OPLOG_LOG";

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What to emit when a batch retracts an entity's identity while adding a
/// page name to it at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageReplacementPolicy {
    /// Treat it as an ordinary block removal.
    #[default]
    Remove,
    /// Treat it as a page removal.
    RemovePage,
}

/// Settings for operation derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeriveConfig {
    /// Master switch; when off no operations are derived at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub page_replacement: PageReplacementPolicy,
    /// Additional attributes whose change re-sends the current value.
    #[serde(default)]
    pub extra_presence_attributes: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_replacement: PageReplacementPolicy::default(),
            extra_presence_attributes: Vec::new(),
        }
    }
}

/// Logging settings for the host binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `graph_oplog_sync=debug`.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LoggingConfig {
    /// Filter directive to install: the `GRAPH_OPLOG_LOG` variable wins over
    /// the configured level.
    pub fn effective_filter(&self) -> String {
        match env::var(LOG_ENV) {
            Ok(filter) if !filter.trim().is_empty() => filter,
            _ => self.level.clone(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OplogConfig {
    #[serde(default)]
    pub derive: DeriveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl OplogConfig {
    /// Load configuration from `GRAPH_OPLOG_CONFIG`, then the platform config
    /// directory, falling back to defaults when neither exists.
    pub fn load() -> Result<Self> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            return Self::load_from_path(&path)
                .with_context(|| format!("loading config named by {}", CONFIG_ENV));
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_path(&path)
                .with_context(|| format!("loading config from {}", path.display())),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Platform config file location, e.g. `~/.config/graph-oplog/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "graph-oplog", "graph-oplog")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn load_from_path(path: &Path) -> std::result::Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing config")
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be empty".into()));
        }
        if let Some(bad) = self
            .derive
            .extra_presence_attributes
            .iter()
            .find(|name| name.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "derive.extra_presence_attributes contains an empty name: {:?}",
                bad
            )));
        }
        Ok(())
    }
}
