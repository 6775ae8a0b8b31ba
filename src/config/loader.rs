//! Configuration loading and persistence.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = serde_json::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Persist a configuration as pretty-printed JSON.
pub fn save_config(path: &Path, config: &GatewayConfig) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

/// Load the configuration, writing the built-in default first if the file
/// does not exist yet.
pub fn load_or_create(path: &Path) -> Result<GatewayConfig, ConfigError> {
    if !path.exists() {
        let config = GatewayConfig::default();
        save_config(path, &config)?;
        return Ok(config);
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("relay-gateway-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = scratch_path("create");
        let _ = fs::remove_file(&path);

        let config = load_or_create(&path).unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert!(path.exists());

        // Second load reads what was written.
        let reloaded = load_or_create(&path).unwrap();
        assert_eq!(reloaded, config);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let path = scratch_path("parse");
        fs::write(&path, "{ not json").unwrap();

        match load_config(&path) {
            Err(ConfigError::Parse(_)) => {}
            other => panic!("expected parse error, got {other:?}"),
        }

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn semantic_errors_are_validation_errors() {
        let path = scratch_path("validate");
        let mut config = GatewayConfig::default();
        config.target.hostname = String::new();
        fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors[0].field, "target.hostname");
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let _ = fs::remove_file(&path);
    }
}
