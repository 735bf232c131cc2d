//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// Smallest request line that can hold `GET / HTTP/1.1\r\n`.
pub const MIN_REQUEST_LINE_SIZE: usize = 16;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid socket address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("limits.max_request_line_size must be at least {min}, got {0}", min = MIN_REQUEST_LINE_SIZE)]
    RequestLineTooSmall(usize),

    #[error("unknown log level: {0}")]
    UnknownLogLevel(String),
}

/// Check a deserialized configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.max_connections",
        });
    }

    if let Some(size) = config.limits.max_request_line_size {
        if size < MIN_REQUEST_LINE_SIZE {
            errors.push(ValidationError::RequestLineTooSmall(size));
        }
    }

    if config.timeouts.request_headers_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_headers_secs",
        });
    }
    if config.timeouts.keep_alive_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.keep_alive_secs",
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
