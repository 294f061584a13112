//! # rpckit Server
//!
//! The transport boundary for rpckit services.
//!
//! This crate stops where the wire begins: it ships no network transport.
//! What it provides is everything a transport needs:
//!
//! - [`Dispatcher`]: resolves handlers, bounds concurrency, and drives the
//!   interceptor chain for each call.
//! - [`CallStatus`] / [`CallOutcome`]: the status sink handed to each call
//!   and the result a transport writes back.
//! - [`TlsCredentials`]: PEM credentials loaded from configured paths at
//!   build time.
//! - [`ShutdownSignal`]: OS-signal or programmatic graceful shutdown.
//! - [`Server`] / [`ServerBuilder`]: wiring of config, logging, app, and
//!   dispatcher behind the [`Transport`] trait.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use rpckit_core::{App, Response, Service};
//! use rpckit_server::Server;
//!
//! let app = Arc::new(App::new("echo"));
//! let mut service = Service::new("echo.Echo");
//! service
//!     .add_fn("Ping", |_request| {
//!         Box::pin(async { Ok(Response::from("pong")) })
//!     })
//!     .expect("fresh method");
//! app.add_service(service).expect("fresh service");
//!
//! let server = Server::builder(app).build().expect("no TLS configured");
//! // hand `server.dispatcher()` to a transport, or `server.run(...)` it
//! ```

#![doc(html_root_url = "https://docs.rs/rpckit-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod dispatch;
mod error;
mod server;
mod shutdown;
mod tls;

pub use dispatch::{CallOutcome, CallStatus, Dispatcher};
pub use error::{ServerError, ServerResult};
pub use server::{Server, ServerBuilder, Transport};
pub use shutdown::ShutdownSignal;
pub use tls::{load_credentials, TlsCredentials};
