//! Main configuration types.
//!
//! This module provides the top-level [`RpckitConfig`] struct and its sections.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default worker pool size.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Default maximum message size in bytes (5 MiB), applied to both directions.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 5 * 1024 * 1024;

/// Complete rpckit configuration.
///
/// This is the root configuration type that contains all configuration
/// sections. Use [`ConfigLoader`](crate::ConfigLoader) to load configuration
/// from files and environment variables.
///
/// # Example
///
/// ```
/// use rpckit_config::RpckitConfig;
///
/// let config = RpckitConfig::default();
/// assert!(!config.debug);
/// assert_eq!(config.server.max_workers, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct RpckitConfig {
    /// Debug mode. When enabled, unhandled errors propagate with full detail
    /// instead of being masked as an opaque internal error.
    #[serde(default)]
    pub debug: bool,

    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// TLS credential configuration.
    #[serde(default)]
    pub tls: TlsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub log: LogSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Maximum number of concurrently executing calls.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Maximum outbound message size in bytes.
    #[serde(default = "default_max_message_length")]
    pub max_send_message_length: usize,

    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_length")]
    pub max_receive_message_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            max_send_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_receive_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

/// TLS credential configuration section.
///
/// All paths are optional; TLS is enabled when both `cert` and `key` are set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// Path to the PEM-encoded server certificate chain.
    #[serde(default)]
    pub cert: Option<PathBuf>,

    /// Path to the PEM-encoded server private key.
    #[serde(default)]
    pub key: Option<PathBuf>,

    /// Path to the PEM-encoded CA certificate used to verify clients.
    /// Setting this enables mutual TLS.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
}

impl TlsConfig {
    /// Whether TLS is enabled (both certificate and key paths are set).
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    /// Log level filter (`trace`, `debug`, `info`, `warn`, `error`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LENGTH
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RpckitConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if:
    /// - `server.max_workers` is zero
    /// - a message size limit is zero
    /// - only one of `tls.cert` / `tls.key` is set
    /// - the log level is not a recognized filter level
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_workers == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_workers",
                "must be at least 1",
            ));
        }

        if self.server.max_send_message_length == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_send_message_length",
                "must be at least 1",
            ));
        }

        if self.server.max_receive_message_length == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_receive_message_length",
                "must be at least 1",
            ));
        }

        // cert and key only make sense as a pair
        match (&self.tls.cert, &self.tls.key) {
            (Some(_), None) => {
                return Err(ConfigError::validation_error(
                    "tls.key is required when tls.cert is set",
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::validation_error(
                    "tls.cert is required when tls.key is set",
                ));
            }
            _ => {}
        }

        if self.tls.ca_cert.is_some() && !self.tls.enabled() {
            return Err(ConfigError::validation_error(
                "tls.ca_cert requires tls.cert and tls.key",
            ));
        }

        match self.log.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::invalid_value(
                    "log.level",
                    format!("unknown log level: {other}"),
                ));
            }
        }

        Ok(())
    }

    /// Create a development configuration (debug mode, pretty logs).
    #[must_use]
    pub fn development() -> Self {
        Self {
            debug: true,
            log: LogSection {
                level: "debug".to_string(),
                json: false,
            },
            ..Default::default()
        }
    }

    /// Create a production configuration (JSON logs, debug off).
    #[must_use]
    pub fn production() -> Self {
        Self {
            debug: false,
            log: LogSection {
                level: "info".to_string(),
                json: true,
            },
            ..Default::default()
        }
    }
}
