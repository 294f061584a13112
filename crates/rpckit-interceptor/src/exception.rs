//! The exception stage.
//!
//! Outermost stage of the chain. It pushes a fresh request context before
//! anything else runs, guarantees exactly one pop on every exit path
//! (including cancellation), and translates escaping errors into the status
//! reported to the caller.

use std::sync::Arc;

use rpckit_core::{
    App, CallHandler, ContextError, Request, RequestContext, Response, RpcError, StatusCode,
    StatusSink,
};

use crate::middleware::{MiddlewareStage, REFLECTION_METHOD};

/// Outcome of error translation.
enum Translation {
    /// Return the response; the sink already carries the status.
    Respond(Response),
    /// Re-raise the original error after the context is unwound.
    Reraise,
}

/// Pops the request context exactly once.
///
/// The drop path covers cancellation: a future dropped mid-call still
/// unwinds the context, with no propagating error to report.
struct ContextGuard {
    ctx: Option<Arc<RequestContext>>,
}

impl ContextGuard {
    fn new(ctx: Arc<RequestContext>) -> Self {
        Self { ctx: Some(ctx) }
    }

    fn finish(mut self, error: Option<&RpcError>) -> Result<(), ContextError> {
        match self.ctx.take() {
            Some(ctx) => ctx.pop(error),
            None => Ok(()),
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            if let Err(error) = ctx.pop(None) {
                tracing::error!(error = %error, "context unwind failed during cancellation");
            }
        }
    }
}

/// Pushes the request context, runs the inner stage, and translates errors.
pub struct ExceptionStage {
    app: Arc<App>,
}

impl ExceptionStage {
    /// Creates the stage for `app`.
    #[must_use]
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    /// Runs one call with full context discipline and error translation.
    ///
    /// Error translation, in order:
    /// 1. debug mode: status `INTERNAL` with the full debug-formatted error,
    ///    and the error is re-raised to the transport;
    /// 2. an explicitly coded [`RpcError::Status`]: code and message applied
    ///    verbatim, empty placeholder response returned;
    /// 3. a registered error handler found along the error's kind chain,
    ///    most derived first;
    /// 4. default: status `INTERNAL`, message `Internal Error`, empty
    ///    placeholder response.
    ///
    /// The request context is popped exactly once on every path, and the
    /// teardown callbacks observe the propagating error. The reserved
    /// reflection method runs without any context at all.
    ///
    /// # Errors
    ///
    /// Returns the original error in debug mode, and context-discipline
    /// errors from pushing or popping the request context.
    pub async fn run(
        &self,
        request: Request,
        middleware: &MiddlewareStage,
        handler: &dyn CallHandler,
        sink: &mut dyn StatusSink,
    ) -> Result<Response, RpcError> {
        // reflection calls skip the context machinery entirely, independent
        // of any preserved context left on the stack
        if request.method() == REFLECTION_METHOD {
            return match middleware.run(&request, handler).await {
                Ok(response) => Ok(response),
                Err(error) => match self.translate(&error, sink) {
                    Translation::Respond(response) => Ok(response),
                    Translation::Reraise => Err(error),
                },
            };
        }

        let ctx = self.app.request_context(request);
        ctx.push()?;
        let guard = ContextGuard::new(Arc::clone(&ctx));

        let result = middleware.run(ctx.request(), handler).await;

        match result {
            Ok(response) => {
                guard.finish(None)?;
                Ok(response)
            }
            Err(error) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    method = ctx.request().method(),
                    error = %error,
                    "call failed"
                );
                let outcome = self.translate(&error, sink);
                guard.finish(Some(&error))?;
                match outcome {
                    Translation::Respond(response) => Ok(response),
                    Translation::Reraise => Err(error),
                }
            }
        }
    }

    fn translate(&self, error: &RpcError, sink: &mut dyn StatusSink) -> Translation {
        if self.app.debug() {
            sink.set_status_code(StatusCode::Internal);
            sink.set_status_message(&format!("{error:?}"));
            return Translation::Reraise;
        }

        if let RpcError::Status { code, message } = error {
            sink.set_status_code(*code);
            sink.set_status_message(message);
            return Translation::Respond(Response::empty());
        }

        if let Some(handler) = self.app.error_handler_for(error) {
            return Translation::Respond(handler(error, sink));
        }

        sink.set_status_code(StatusCode::Internal);
        sink.set_status_message("Internal Error");
        Translation::Respond(Response::empty())
    }
}
