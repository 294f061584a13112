//! Server boundary errors.
//!
//! [`ServerError`] covers everything that can go wrong between building a
//! [`Server`](crate::Server) and a transport serving calls: credential
//! loading, service wiring, logging setup, and transport failures.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using [`ServerError`].
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised at the server boundary.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A configured TLS credential file could not be read.
    #[error("failed to read TLS credential file {path}: {source}")]
    TlsFile {
        /// The configured path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Service or method registration failed.
    #[error(transparent)]
    Setup(#[from] rpckit_core::SetupError),

    /// Logging initialization failed.
    #[error(transparent)]
    LoggingInit(#[from] rpckit_telemetry::TelemetryError),

    /// A transport failed while serving.
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
}

impl ServerError {
    /// Creates a TLS file error for `path`.
    #[must_use]
    pub fn tls_file(path: &Path, source: std::io::Error) -> Self {
        Self::TlsFile {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a transport failure error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
