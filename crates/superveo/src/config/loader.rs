use std::path::Path;

use crate::config::schema::AppConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<AppConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: AppConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub(crate) fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.poll_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "pollIntervalSecs must be at least 1".to_string(),
        });
    }

    if !(5..=10).contains(&config.initial_progress) {
        return Err(ConfigError::Validation {
            message: format!(
                "initialProgress must be between 5 and 10, got {}",
                config.initial_progress
            ),
        });
    }

    if !config.api_base_url.starts_with("http://") && !config.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation {
            message: format!("apiBaseUrl must be an http(s) URL: {}", config.api_base_url),
        });
    }

    if config.default_model.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "defaultModel must not be empty".to_string(),
        });
    }

    Ok(())
}
