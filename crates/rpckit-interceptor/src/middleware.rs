//! The lifecycle hook stage.
//!
//! Runs the app's before-request hooks, the user interceptor onion, and the
//! after-request hooks around the handler. The reserved reflection method
//! bypasses all of it.

use std::sync::Arc;

use rpckit_core::{App, CallHandler, Request, Response, RpcError};

use crate::interceptor::{Interceptor, Next};

/// The reserved server reflection method.
///
/// Calls to this method bypass hooks, user interceptors, and the context
/// machinery entirely, so reflection keeps working no matter what the hooks
/// do.
pub const REFLECTION_METHOD: &str =
    "/grpc.reflection.v1alpha.ServerReflection/ServerReflectionInfo";

/// Drives the before hooks, user interceptors, and after hooks of one call.
pub struct MiddlewareStage {
    app: Arc<App>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl MiddlewareStage {
    /// Creates the stage for `app` with the given user interceptors, in
    /// onion order (first is outermost).
    #[must_use]
    pub fn new(app: Arc<App>, interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self { app, interceptors }
    }

    /// The registered user interceptor names, in onion order.
    pub fn interceptor_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.interceptors.iter().map(|i| i.name())
    }

    /// Runs one call through hooks and interceptors.
    ///
    /// - The reflection method goes straight to the handler.
    /// - Before-request hooks run in registration order; the first one
    ///   producing a response short-circuits everything that follows,
    ///   including the after hooks.
    /// - After-request hooks run in registration order; each must return a
    ///   non-empty response or the call fails naming the hook.
    ///
    /// # Errors
    ///
    /// Propagates errors from hooks, interceptors, and the handler; yields
    /// [`RpcError::EmptyHookResponse`] when an after hook returns an empty
    /// response.
    pub async fn run(
        &self,
        request: &Request,
        handler: &dyn CallHandler,
    ) -> Result<Response, RpcError> {
        if request.method() == REFLECTION_METHOD {
            return handler.call(request).await;
        }

        // snapshots keep the hook tables' lock out of the await points
        let before = self.app.before_hooks();
        for hook in &before {
            if let Some(response) = hook(request).await? {
                tracing::debug!(method = request.method(), "before hook short-circuited call");
                return Ok(response);
            }
        }

        let mut response = self.run_interceptors(request, handler).await?;

        let after = self.app.after_hooks();
        for hook in &after {
            response = (hook.func)(response).await?;
            if response.is_empty() {
                return Err(RpcError::empty_hook_response(hook.name.clone()));
            }
        }

        Ok(response)
    }

    async fn run_interceptors(
        &self,
        request: &Request,
        handler: &dyn CallHandler,
    ) -> Result<Response, RpcError> {
        let mut next = Next::handler(handler);
        for interceptor in self.interceptors.iter().rev() {
            next = Next::new(interceptor.as_ref(), next);
        }
        next.run(request).await
    }
}
