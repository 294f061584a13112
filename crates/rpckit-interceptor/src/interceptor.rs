//! The user interceptor trait and chain plumbing.
//!
//! User interceptors nest strictly: registration order is onion order, with
//! the first registered interceptor outermost and the handler innermost.
//! Each interceptor receives a [`Next`] and decides whether to continue the
//! chain, replace the response, or fail the call.

use rpckit_core::{BoxFuture, CallHandler, Request, Response, RpcError};

/// A user interceptor wrapping handler execution.
///
/// # Invariants
///
/// - An interceptor calls `next.run()` at most once; not calling it
///   short-circuits the rest of the chain.
/// - Interceptors run inside the lifecycle hooks: before-request hooks have
///   already passed when the outermost interceptor starts.
///
/// # Example
///
/// ```
/// use rpckit_core::{BoxFuture, Request, Response, RpcError};
/// use rpckit_interceptor::{Interceptor, Next};
///
/// struct Timing;
///
/// impl Interceptor for Timing {
///     fn name(&self) -> &'static str {
///         "timing"
///     }
///
///     fn intercept<'a>(
///         &'a self,
///         request: &'a Request,
///         next: Next<'a>,
///     ) -> BoxFuture<'a, Result<Response, RpcError>> {
///         Box::pin(async move {
///             let start = std::time::Instant::now();
///             let response = next.run(request).await;
///             tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "call done");
///             response
///         })
///     }
/// }
/// ```
pub trait Interceptor: Send + Sync + 'static {
    /// The interceptor's name, used in diagnostics.
    fn name(&self) -> &'static str;

    /// Processes the call, delegating to `next` to continue the chain.
    fn intercept<'a>(
        &'a self,
        request: &'a Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, RpcError>>;
}

/// Callback invoking the rest of the interceptor chain.
///
/// Consumed by [`run`](Next::run), so it can be invoked at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        interceptor: &'a dyn Interceptor,
        next: Box<Next<'a>>,
    },
    Handler(&'a dyn CallHandler),
}

impl<'a> Next<'a> {
    pub(crate) fn new(interceptor: &'a dyn Interceptor, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                interceptor,
                next: Box::new(next),
            },
        }
    }

    pub(crate) fn handler(handler: &'a dyn CallHandler) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Invokes the next interceptor, or the handler at the end of the chain.
    pub async fn run(self, request: &'a Request) -> Result<Response, RpcError> {
        match self.inner {
            NextInner::Chain { interceptor, next } => interceptor.intercept(request, *next).await,
            NextInner::Handler(handler) => handler.call(request).await,
        }
    }
}

/// An interceptor built from a closure.
///
/// # Example
///
/// ```
/// use rpckit_interceptor::FnInterceptor;
///
/// let interceptor = FnInterceptor::new("passthrough", |request, next| {
///     Box::pin(async move { next.run(request).await })
/// });
/// ```
pub struct FnInterceptor<F> {
    name: &'static str,
    func: F,
}

impl<F> FnInterceptor<F>
where
    F: for<'a> Fn(&'a Request, Next<'a>) -> BoxFuture<'a, Result<Response, RpcError>>
        + Send
        + Sync
        + 'static,
{
    /// Wraps `func` as an interceptor called `name`.
    #[must_use]
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: for<'a> Fn(&'a Request, Next<'a>) -> BoxFuture<'a, Result<Response, RpcError>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn intercept<'a>(
        &'a self,
        request: &'a Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, RpcError>> {
        (self.func)(request, next)
    }
}
