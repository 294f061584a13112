//! # rpckit Core
//!
//! Core types for the rpckit RPC framework:
//!
//! - [`ContextStack`] - per-task/thread LIFO stacks of context objects
//! - [`AppContext`] / [`RequestContext`] - the two context state machines
//! - [`current_app`] / [`current_request`] / [`scratch`] - ambient accessors
//! - [`Request`] / [`Response`] - call wrappers
//! - [`RpcError`] / [`StatusCode`] / [`ErrorKind`] - the error taxonomy
//! - [`App`] - the application object and its registration API
//! - [`Service`] / [`Router`] - method routing

#![doc(html_root_url = "https://docs.rs/rpckit-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod ctx;
mod error;
mod globals;
mod local;
mod service;
mod wrapper;

pub use app::{AfterHook, AfterHookFn, App, BeforeHook, ErrorHandlerFn, TeardownHook};
pub use ctx::{AppContext, RequestContext, RequestId};
pub use error::{ContextError, ErrorKind, RpcError, RpcResult, StatusCode};
pub use globals::{current_app, current_app_context, current_request, scratch, Scratch};
pub use local::{ContextKey, ContextStack};
pub use service::{BoxFuture, CallHandler, FnHandler, Router, Service, SetupError};
pub use wrapper::{Metadata, Request, Response, StatusSink};
