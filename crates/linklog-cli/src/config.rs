//! Persistent CLI configuration.
//!
//! Values come from the JSON config file; environment variables of the same
//! name as the library's (`LINKLOG_ENDPOINT_URL`, ...) take precedence.

use std::path::{Path, PathBuf};

use linklog_core::config::{
    ENV_DRAIN_INTERVAL_SECS, ENV_ENDPOINT_URL, ENV_REQUEST_TIMEOUT_SECS, ENV_TOKEN,
};
use linklog_core::config::non_blank;
use linklog_core::{SchedulerConfig, SinkConfig};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub drain_interval_secs: Option<u64>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("linklog").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".to_string()))
}

fn env_lookup(name: &str) -> Option<String> {
    non_blank(std::env::var(name).ok())
}

impl CliConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self {
                version: default_config_version(),
                ..Self::default()
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!(
                "Failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            CliError::Config(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CliError::Config(format!(
                    "Failed to create config directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized).map_err(|error| {
            CliError::Config(format!(
                "Failed to write config at {}: {error}",
                path.display()
            ))
        })
    }

    fn normalize(&mut self) {
        self.endpoint_url = non_blank(self.endpoint_url.take());
        self.token = non_blank(self.token.take());
    }

    fn file_value(&self, name: &str) -> Option<String> {
        match name {
            ENV_ENDPOINT_URL => self.endpoint_url.clone(),
            ENV_TOKEN => self.token.clone(),
            ENV_REQUEST_TIMEOUT_SECS => self.request_timeout_secs.map(|secs| secs.to_string()),
            ENV_DRAIN_INTERVAL_SECS => self.drain_interval_secs.map(|secs| secs.to_string()),
            _ => None,
        }
    }

    /// Effective value for `name`: `env` first, then the file.
    pub fn resolve(&self, name: &str, env: &impl Fn(&str) -> Option<String>) -> Option<String> {
        env(name).or_else(|| self.file_value(name))
    }

    pub fn sink_config(&self) -> Result<SinkConfig, CliError> {
        self.sink_config_with(&env_lookup)
    }

    pub fn sink_config_with(
        &self,
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<SinkConfig, CliError> {
        SinkConfig::from_lookup(|name| self.resolve(name, env))
            .map_err(|error| CliError::NotConfigured(error.to_string()))
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, CliError> {
        self.scheduler_config_with(&env_lookup)
    }

    pub fn scheduler_config_with(
        &self,
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<SchedulerConfig, CliError> {
        Ok(SchedulerConfig::from_lookup(|name| self.resolve(name, env))?)
    }
}
