//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::MonitorConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::service::spec::ServiceSpec;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A configuration that passed validation, with its resolved services.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub settings: MonitorConfig,
    pub services: Vec<ServiceSpec>,
}

/// Parse configuration text. JSON when `json` is set, TOML otherwise.
pub fn parse_config(content: &str, json: bool) -> Result<ValidatedConfig, ConfigError> {
    let settings: MonitorConfig = if json {
        serde_json::from_str(content)?
    } else {
        toml::from_str(content)?
    };

    let services = validate_config(&settings).map_err(ConfigError::Validation)?;
    Ok(ValidatedConfig { settings, services })
}

/// Load and validate configuration from a TOML file, or JSON for `.json` paths.
pub fn load_config(path: &Path) -> Result<ValidatedConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    parse_config(&content, json)
}
