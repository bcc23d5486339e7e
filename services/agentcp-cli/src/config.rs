//! CLI configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides.
//! Default config path: `./acp-cli.toml`.
//!
//! # Required fields
//! - `ca_base`
//! - `ap_base`

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub ca_base: String,
    pub ap_base: String,
    pub storage_path: Option<String>,
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    ca_base: Option<String>,
    ap_base: Option<String>,
    storage_path: Option<String>,
    log_level: Option<String>,
}

pub fn load_config_from_path(path: &Path) -> Result<CliConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
    load_config_from_str(&toml_str)
}

pub fn load_config_from_str(toml_str: &str) -> Result<CliConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let ca_base = raw.ca_base.ok_or_else(|| ConfigError::MissingField("ca_base".to_owned()))?;
    let ap_base = raw.ap_base.ok_or_else(|| ConfigError::MissingField("ap_base".to_owned()))?;

    Ok(CliConfig {
        ca_base,
        ap_base,
        storage_path: raw.storage_path,
        log_level: raw.log_level.unwrap_or_else(|| "info".to_owned()),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
            ConfigError::MissingField(s) => write!(f, "missing required field: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ca_base_is_rejected() {
        let err = load_config_from_str("ap_base = \"https://ap.example\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "ca_base"));
    }

    #[test]
    fn log_level_defaults_to_info() {
        let cfg = load_config_from_str("ca_base = \"https://ca.example\"\nap_base = \"https://ap.example\"\n").unwrap();
        assert_eq!(cfg.log_level, "info");
    }
}
