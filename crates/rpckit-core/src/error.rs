//! Error types for rpckit.
//!
//! This module provides [`RpcError`], the standard error type flowing through
//! handlers and hooks, together with [`StatusCode`] (the gRPC status code
//! set), [`ErrorKind`] (the classification used for handler dispatch), and
//! [`ContextError`] (context-discipline violations).
//!
//! # Error handler dispatch
//!
//! Every [`RpcError`] maps to an [`ErrorKind`]. Kinds form an explicit chain
//! from most specific to most general:
//!
//! ```text
//! NotFound -> Client -> Any
//! Internal -> Server -> Any
//! ```
//!
//! The exception stage walks this chain most-derived-first when looking up a
//! registered error handler, so a handler registered for `ErrorKind::Client`
//! catches every client-classified error that has no more specific handler.

use thiserror::Error;

/// Result type alias using [`RpcError`].
pub type RpcResult<T> = Result<T, RpcError>;

/// gRPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    /// Not an error; returned on success.
    Ok = 0,
    /// The operation was cancelled by the caller.
    Cancelled = 1,
    /// Unknown error.
    Unknown = 2,
    /// The client specified an invalid argument.
    InvalidArgument = 3,
    /// The deadline expired before the operation could complete.
    DeadlineExceeded = 4,
    /// The requested entity was not found.
    NotFound = 5,
    /// The entity that a client attempted to create already exists.
    AlreadyExists = 6,
    /// The caller does not have permission to execute the operation.
    PermissionDenied = 7,
    /// Some resource has been exhausted.
    ResourceExhausted = 8,
    /// The system is not in a state required for the operation.
    FailedPrecondition = 9,
    /// The operation was aborted.
    Aborted = 10,
    /// The operation was attempted past the valid range.
    OutOfRange = 11,
    /// The operation is not implemented or supported.
    Unimplemented = 12,
    /// Internal error.
    Internal = 13,
    /// The service is currently unavailable.
    Unavailable = 14,
    /// Unrecoverable data loss or corruption.
    DataLoss = 15,
    /// The request does not have valid authentication credentials.
    Unauthenticated = 16,
}

impl StatusCode {
    /// Returns the canonical name of the status code (e.g. `NOT_FOUND`).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Context-discipline errors.
///
/// These indicate misuse of the context stacks, never a failure of the call
/// itself.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// An ambient accessor was used with no active application context.
    #[error("working outside of application context")]
    NoAppContext,

    /// An ambient accessor was used with no active request context.
    #[error("working outside of request context")]
    NoRequestContext,

    /// A context was popped that is not the current top of its stack.
    #[error("popped wrong context")]
    WrongContext,

    /// A context was popped that was never pushed.
    #[error("popped unpushed context")]
    NotPushed,
}

/// Classification of an [`RpcError`] for handler dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Matches any error. The root of every kind chain.
    Any,
    /// Errors attributable to the caller.
    Client,
    /// Errors attributable to the service.
    Server,
    /// An explicitly coded status error.
    Status,
    /// Invalid argument supplied by the caller.
    InvalidArgument,
    /// Requested entity not found.
    NotFound,
    /// Caller lacks permission.
    PermissionDenied,
    /// Caller is not authenticated.
    Unauthenticated,
    /// System state does not allow the operation.
    FailedPrecondition,
    /// Deadline expired.
    DeadlineExceeded,
    /// Service unavailable.
    Unavailable,
    /// Internal failure.
    Internal,
    /// A lifecycle hook returned an empty response.
    EmptyHookResponse,
    /// Context-discipline violation.
    Context,
}

impl ErrorKind {
    /// Returns the parent kind, or `None` for [`ErrorKind::Any`].
    #[must_use]
    pub const fn parent(&self) -> Option<Self> {
        match self {
            Self::Any => None,
            Self::Client | Self::Server | Self::Status => Some(Self::Any),
            Self::InvalidArgument
            | Self::NotFound
            | Self::PermissionDenied
            | Self::Unauthenticated
            | Self::FailedPrecondition => Some(Self::Client),
            Self::DeadlineExceeded
            | Self::Unavailable
            | Self::Internal
            | Self::EmptyHookResponse
            | Self::Context => Some(Self::Server),
        }
    }

    /// Enumerates this kind and its ancestors, most derived first.
    #[must_use]
    pub fn chain(&self) -> Vec<Self> {
        let mut kinds = vec![*self];
        let mut current = *self;
        while let Some(parent) = current.parent() {
            kinds.push(parent);
            current = parent;
        }
        kinds
    }
}

/// Standard error type for rpckit calls.
///
/// # Example
///
/// ```
/// use rpckit_core::RpcError;
///
/// fn lookup(id: &str) -> Result<String, RpcError> {
///     if id.is_empty() {
///         return Err(RpcError::invalid_argument("id must not be empty"));
///     }
///     Err(RpcError::not_found(format!("no record for {id}")))
/// }
/// ```
#[derive(Error, Debug)]
pub enum RpcError {
    /// An explicitly coded status error. The exception stage applies its
    /// code and message to the call verbatim.
    #[error("{code}: {message}")]
    Status {
        /// Status code to report.
        code: StatusCode,
        /// Detail message to report.
        message: String,
    },

    /// Invalid argument supplied by the caller.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable error message.
        message: String,
    },

    /// Requested entity not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Caller lacks permission.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Human-readable error message.
        message: String,
    },

    /// Caller is not authenticated.
    #[error("unauthenticated: {message}")]
    Unauthenticated {
        /// Human-readable error message.
        message: String,
    },

    /// System state does not allow the operation.
    #[error("failed precondition: {message}")]
    FailedPrecondition {
        /// Human-readable error message.
        message: String,
    },

    /// Deadline expired.
    #[error("deadline exceeded: {message}")]
    DeadlineExceeded {
        /// Human-readable error message.
        message: String,
    },

    /// Service unavailable.
    #[error("unavailable: {message}")]
    Unavailable {
        /// Human-readable error message.
        message: String,
    },

    /// Internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error, never exposed to clients outside debug mode.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A lifecycle hook returned an empty response.
    #[error("hook {hook:?} returned an empty response")]
    EmptyHookResponse {
        /// Name of the offending hook.
        hook: String,
    },

    /// Context-discipline violation.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl RpcError {
    /// Creates an explicitly coded status error.
    #[must_use]
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a permission denied error.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Creates an unauthenticated error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates a failed precondition error.
    #[must_use]
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition {
            message: message.into(),
        }
    }

    /// Creates a deadline exceeded error.
    #[must_use]
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::DeadlineExceeded {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error wrapping a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an empty hook response error naming the offending hook.
    #[must_use]
    pub fn empty_hook_response(hook: impl Into<String>) -> Self {
        Self::EmptyHookResponse { hook: hook.into() }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { .. } => ErrorKind::Status,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Self::FailedPrecondition { .. } => ErrorKind::FailedPrecondition,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::EmptyHookResponse { .. } => ErrorKind::EmptyHookResponse,
            Self::Context(_) => ErrorKind::Context,
        }
    }

    /// Returns the status code this error would report if unhandled by a
    /// custom error handler.
    #[must_use]
    pub const fn code(&self) -> StatusCode {
        match self {
            Self::Status { code, .. } => *code,
            Self::InvalidArgument { .. } => StatusCode::InvalidArgument,
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::PermissionDenied { .. } => StatusCode::PermissionDenied,
            Self::Unauthenticated { .. } => StatusCode::Unauthenticated,
            Self::FailedPrecondition { .. } => StatusCode::FailedPrecondition,
            Self::DeadlineExceeded { .. } => StatusCode::DeadlineExceeded,
            Self::Unavailable { .. } => StatusCode::Unavailable,
            Self::Internal { .. } | Self::EmptyHookResponse { .. } | Self::Context(_) => {
                StatusCode::Internal
            }
        }
    }
}
