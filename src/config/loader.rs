//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

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

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_file() {
        let path = std::env::temp_dir().join(format!("h1-guard-loader-{}.toml", std::process::id()));
        fs::write(
            &path,
            "[limits]\nmax_request_header_count = 1\nmax_request_headers_total_size = 90\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.limits.max_request_header_count, Some(1));
        assert_eq!(config.limits.max_request_headers_total_size, Some(90));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/h1-guard.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let err = parse_config("[limits\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_errors_are_joined() {
        let err = parse_config("[listener]\nbind_address = \"x\"\nmax_connections = 0\n").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation failed: "));
        assert!(message.contains("listener.bind_address"));
        assert!(message.contains("listener.max_connections"));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let err = parse_config("[limits]\nmax_request_header_count = \"many\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
