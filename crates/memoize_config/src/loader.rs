//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::MemoizeConfig;
use std::path::Path;

/// Loads and validates a `memoize.toml` configuration from a project
/// directory.
///
/// Reads `<project_dir>/memoize.toml`, parses it, and validates
/// required fields.
pub fn load_config(project_dir: &Path) -> Result<MemoizeConfig, ConfigError> {
    let config_path = project_dir.join("memoize.toml");
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `memoize.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<MemoizeConfig, ConfigError> {
    let config: MemoizeConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and consistent.
fn validate_config(config: &MemoizeConfig) -> Result<(), ConfigError> {
    if config.stage.name.is_empty() {
        return Err(ConfigError::MissingField("stage.name".to_string()));
    }
    if config.stage.name.contains('/') || config.stage.name.contains('\\') {
        return Err(ConfigError::ValidationError(format!(
            "stage name '{}' must not contain path separators",
            config.stage.name
        )));
    }
    if config.stage.cache_path.is_empty() {
        return Err(ConfigError::MissingField("stage.cache_path".to_string()));
    }
    if config.paths.source.is_empty() {
        return Err(ConfigError::MissingField("paths.source".to_string()));
    }
    if config.paths.output.is_empty() {
        return Err(ConfigError::MissingField("paths.output".to_string()));
    }
    Ok(())
}
