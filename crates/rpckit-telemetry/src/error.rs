//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up telemetry.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Logging initialization failed.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_init_error() {
        let err = TelemetryError::LoggingInit("invalid filter".to_string());
        assert!(err.to_string().contains("invalid filter"));
    }
}
