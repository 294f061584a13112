//! # rpckit Interceptor
//!
//! The call pipeline for rpckit services.
//!
//! Every call flows through a fixed composition:
//!
//! ```text
//! ExceptionStage                (context push/pop, error translation)
//!   MiddlewareStage             (before hooks, after hooks, reflection bypass)
//!     user interceptors         (registration order = onion order)
//!       handler
//! ```
//!
//! The [`InterceptorChain`] is the transport-facing entry point; user
//! interceptors implement [`Interceptor`] or wrap a closure with
//! [`FnInterceptor`].

#![doc(html_root_url = "https://docs.rs/rpckit-interceptor/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod chain;
mod exception;
mod interceptor;
mod middleware;

pub use chain::{InterceptorChain, InterceptorChainBuilder};
pub use exception::ExceptionStage;
pub use interceptor::{FnInterceptor, Interceptor, Next};
pub use middleware::{MiddlewareStage, REFLECTION_METHOD};
