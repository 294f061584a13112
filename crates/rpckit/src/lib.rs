//! # rpckit
//!
//! **Request-context propagation and interceptor pipeline for RPC services**
//!
//! rpckit gives an RPC server application-object ergonomics without implicit
//! globals: an [`App`](core::App) carrying lifecycle hooks and error
//! handlers, per-call [`RequestContext`](core::RequestContext)s addressable
//! through ambient accessors, and a fixed interceptor pipeline every call
//! flows through.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use rpckit::prelude::*;
//!
//! let app = Arc::new(App::new("echo"));
//!
//! app.before_request(|_request| Box::pin(async { Ok(None) }));
//! app.teardown_request(|_error| tracing::debug!("call finished"));
//!
//! let mut service = Service::new("echo.Echo");
//! service
//!     .add_fn("Ping", |request| {
//!         let payload = request.payload().clone();
//!         Box::pin(async move { Ok(Response::new(payload)) })
//!     })
//!     .expect("fresh method");
//! app.add_service(service).expect("fresh service");
//!
//! let server = Server::builder(app).build().expect("no TLS configured");
//! // hand server.dispatcher() to a transport
//! ```
//!
//! ## Pipeline
//!
//! The call pipeline is fixed and cannot be reordered:
//!
//! ```text
//! ExceptionStage      context push/pop, error translation
//!   MiddlewareStage   before hooks, after hooks, reflection bypass
//!     interceptors    registration order = onion order
//!       handler
//! ```

#![doc(html_root_url = "https://docs.rs/rpckit/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use rpckit_config as config;
pub use rpckit_core as core;
pub use rpckit_interceptor as interceptor;
pub use rpckit_server as server;
pub use rpckit_telemetry as telemetry;

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use rpckit_config::{ConfigLoader, RpckitConfig};
    pub use rpckit_core::{
        current_app, current_request, scratch, App, AppContext, Metadata, Request, RequestContext,
        Response, RpcError, RpcResult, Service, StatusCode,
    };
    pub use rpckit_interceptor::{FnInterceptor, Interceptor, InterceptorChain, Next};
    pub use rpckit_server::{Dispatcher, Server, ServerBuilder, ShutdownSignal, Transport};
}
