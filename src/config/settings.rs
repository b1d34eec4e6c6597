//! Profiler settings
//!
//! Manages settings stored in ~/.dbprofiler/config.toml

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Profiler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerSettings {
    /// Wrap connections at all; when false `wrap_with` hands back the driver
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pretty-print logged statements
    #[serde(default)]
    pub format_sql: bool,

    #[serde(default = "default_indent")]
    pub indent: u8,

    /// Display width logged statements are truncated to (0 = unlimited)
    #[serde(default = "default_max_statement_len")]
    pub max_statement_len: usize,

    /// Substitute parameter values into logged statements
    #[serde(default = "default_true")]
    pub log_parameters: bool,
}

fn default_indent() -> u8 {
    2
}

fn default_max_statement_len() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            format_sql: false,
            indent: default_indent(),
            max_statement_len: default_max_statement_len(),
            log_parameters: default_true(),
        }
    }
}

impl ProfilerSettings {
    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let settings: ProfilerSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.indent > 16 {
            return Err(ConfigError::Invalid(format!(
                "indent must be at most 16, got {}",
                self.indent
            )));
        }
        Ok(())
    }

    /// Get the config directory path (~/.dbprofiler/)
    pub fn config_dir() -> ConfigResult<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".dbprofiler"))
            .ok_or(ConfigError::NoHomeDir)
    }
}

/// Load settings from the default config file
pub fn load_settings() -> ConfigResult<ProfilerSettings> {
    let path = ProfilerSettings::config_dir()?.join("config.toml");
    load_settings_from(&path)
}

/// Load settings from `path`, falling back to defaults if it doesn't exist
pub fn load_settings_from(path: &Path) -> ConfigResult<ProfilerSettings> {
    if !path.exists() {
        return Ok(ProfilerSettings::default());
    }
    let content = std::fs::read_to_string(path)?;
    ProfilerSettings::from_toml_str(&content)
}
