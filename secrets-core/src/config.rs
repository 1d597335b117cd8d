//! Layered configuration: defaults, then an optional file, then the environment.

use crate::errors::{Error, Result};
use crate::key_provider::none;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const PROVIDER_ENV: &str = "FORGE_SECRETS_MASTER_KEY_PROVIDER";
pub const KEY_FILE_ENV: &str = "FORGE_SECRETS_KEY_FILE";
pub const GENERATE_ENV: &str = "FORGE_SECRETS_GENERATE_IF_MISSING";

pub const DEFAULT_KEY_FILE: &str = ".forge-secrets.key";

/// Resolved settings for [`SecretsService::init`](crate::SecretsService::init).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Registry name of the master key custody backend.
    pub master_key_provider: String,
    /// Key file used by the `plain` provider.
    pub key_file: PathBuf,
    /// Let the `plain` provider bootstrap a key when custody is empty.
    pub generate_if_missing: bool,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            master_key_provider: none::KIND.to_string(),
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            generate_if_missing: false,
        }
    }
}

impl SecretsConfig {
    /// Config with the given provider and defaults for everything else.
    pub fn with_provider(provider: impl Into<String>) -> Self {
        Self {
            master_key_provider: provider.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with the optional file and then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            config.apply(ConfigLayer::from_file(path)?);
        }
        config.apply(ConfigLayer::from_env()?);
        Ok(config)
    }

    /// Overlay every field the layer sets.
    pub fn apply(&mut self, layer: ConfigLayer) {
        if let Some(provider) = layer.master_key_provider {
            self.master_key_provider = provider;
        }
        if let Some(key_file) = layer.key_file {
            self.key_file = key_file;
        }
        if let Some(generate) = layer.generate_if_missing {
            self.generate_if_missing = generate;
        }
    }
}

/// Partial configuration from a single source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub master_key_provider: Option<String>,
    pub key_file: Option<PathBuf>,
    pub generate_if_missing: Option<bool>,
}

impl ConfigLayer {
    /// Parse a TOML file, or JSON when the extension is `.json`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|err| {
            Error::Configuration(format!("failed to read config {}: {err}", path.display()))
        })?;

        if path.extension().map(|ext| ext == "json").unwrap_or(false) {
            serde_json::from_str(&data).map_err(|err| {
                Error::Configuration(format!("invalid json config {}: {err}", path.display()))
            })
        } else {
            toml::from_str(&data).map_err(|err| {
                Error::Configuration(format!("invalid toml config {}: {err}", path.display()))
            })
        }
    }

    /// Read the `FORGE_SECRETS_*` variables. Blank values are ignored.
    pub fn from_env() -> Result<Self> {
        let mut layer = Self::default();

        if let Some(provider) = env_value(PROVIDER_ENV) {
            layer.master_key_provider = Some(provider);
        }

        if let Some(path) = env_value(KEY_FILE_ENV) {
            layer.key_file = Some(PathBuf::from(path));
        }

        if let Some(flag) = env_value(GENERATE_ENV) {
            layer.generate_if_missing = Some(parse_bool(GENERATE_ENV, &flag)?);
        }

        Ok(layer)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Configuration(format!(
            "{name} must be a boolean, got `{other}`"
        ))),
    }
}
