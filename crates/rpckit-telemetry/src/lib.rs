//! # rpckit Telemetry
//!
//! Structured logging setup for rpckit services.
//!
//! This crate wires the tracing-subscriber ecosystem into a small, typed
//! surface: a [`LogConfig`], an [`init_logging`] entry point, and the
//! standard field names used across the framework's log lines.
//!
//! # Example
//!
//! ```rust,ignore
//! use rpckit_telemetry::{LogConfig, init_logging};
//!
//! init_logging(&LogConfig::development())?;
//!
//! tracing::info!(method = "/echo.Echo/Ping", "handling call");
//! ```

#![doc(html_root_url = "https://docs.rs/rpckit-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
