//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::security::HeaderLimits;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Request head limits.
    pub limits: HeaderLimits,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeouts owned by the connection layer.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to receive a whole request head, in seconds.
    pub request_headers_secs: u64,

    /// Idle time allowed between requests on a kept-alive connection, in seconds.
    pub keep_alive_secs: u64,

    /// How long to keep discarding client bytes after an error response, in milliseconds.
    pub linger_ms: u64,

    /// Upper bound on bytes discarded after an error response.
    pub linger_bytes: usize,

    /// Grace period for open connections on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl TimeoutConfig {
    pub fn request_headers(&self) -> Duration {
        Duration::from_secs(self.request_headers_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_headers_secs: 30,
            keep_alive_secs: 130,
            linger_ms: 500,
            linger_bytes: 64 * 1024,
            shutdown_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
