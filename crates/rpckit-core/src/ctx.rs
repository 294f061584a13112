//! Application and request contexts.
//!
//! An [`AppContext`] binds an [`App`] to the current task or thread and
//! carries the per-context scratch storage. A [`RequestContext`] binds one
//! call; pushing it implicitly pushes an application context when none is
//! active for the same app.
//!
//! Context discipline is strict: pops must mirror pushes, and popping
//! anything but the current top is a [`ContextError::WrongContext`], never a
//! silent fixup.

use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::app::App;
use crate::error::{ContextError, RpcError};
use crate::globals::{app_ctx_stack, request_ctx_stack};
use crate::wrapper::Request;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The application context.
///
/// Holds the app binding and the scratch map for ambient storage. Pushing
/// the same context again bumps a reference count instead of duplicating
/// teardown: teardown callbacks run only when the count returns to zero.
pub struct AppContext {
    app: Arc<App>,
    scratch: Mutex<Map<String, Value>>,
    ref_count: AtomicIsize,
}

impl AppContext {
    pub(crate) fn new(app: Arc<App>) -> Arc<Self> {
        Arc::new(Self {
            app,
            scratch: Mutex::new(Map::new()),
            ref_count: AtomicIsize::new(0),
        })
    }

    /// The app this context is bound to.
    #[must_use]
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    pub(crate) fn scratch_map(&self) -> &Mutex<Map<String, Value>> {
        &self.scratch
    }

    /// Binds this context to the current task/thread.
    ///
    /// Re-pushing an already active context increments its reference count
    /// and pushes the same object again.
    pub fn push(self: &Arc<Self>) {
        self.ref_count.fetch_add(1, Ordering::SeqCst);
        app_ctx_stack().push(Arc::clone(self));
    }

    /// Unbinds this context from the current task/thread.
    ///
    /// Runs the app-context teardown callbacks (with the propagating error,
    /// if any) once the reference count reaches zero, then pops the stack.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::WrongContext`] if this context is not the
    /// current top of the stack. The stack is popped regardless.
    pub fn pop(self: &Arc<Self>, error: Option<&RpcError>) -> Result<(), ContextError> {
        let remaining = self.ref_count.fetch_sub(1, Ordering::SeqCst) - 1;
        let guard = AppPopGuard { ctx: self };
        if remaining <= 0 {
            self.app.do_teardown_app_context(error);
        }
        guard.finish()
    }
}

/// Pops the app-context stack even when a teardown callback unwinds; a
/// panicking callback must not leave the context bound to this task.
struct AppPopGuard<'a> {
    ctx: &'a Arc<AppContext>,
}

impl AppPopGuard<'_> {
    fn pop_stack(ctx: &Arc<AppContext>) -> Result<(), ContextError> {
        match app_ctx_stack().pop() {
            Some(popped) if Arc::ptr_eq(&popped, ctx) => Ok(()),
            _ => Err(ContextError::WrongContext),
        }
    }

    fn finish(self) -> Result<(), ContextError> {
        let result = Self::pop_stack(self.ctx);
        std::mem::forget(self);
        result
    }
}

impl Drop for AppPopGuard<'_> {
    fn drop(&mut self) {
        let _ = Self::pop_stack(self.ctx);
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("app", &self.app.name())
            .field("ref_count", &self.ref_count.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

struct Preserved {
    error: Option<RpcError>,
}

/// The request context.
///
/// Wraps one call and tracks whether pushing it implicitly created an
/// application context, so popping unwinds exactly what pushing set up.
pub struct RequestContext {
    app: Arc<App>,
    request: Request,
    request_id: RequestId,
    implicit_app_ctx: Mutex<Vec<Option<Arc<AppContext>>>>,
    preserved: Mutex<Option<Preserved>>,
}

impl RequestContext {
    pub(crate) fn new(app: Arc<App>, request: Request) -> Arc<Self> {
        Arc::new(Self {
            app,
            request,
            request_id: RequestId::new(),
            implicit_app_ctx: Mutex::new(Vec::new()),
            preserved: Mutex::new(None),
        })
    }

    /// The app this context is bound to.
    #[must_use]
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// The wrapped request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// This request's correlation ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Whether teardown has been deferred by [`preserve`](Self::preserve).
    #[must_use]
    pub fn is_preserved(&self) -> bool {
        self.preserved.lock().is_some()
    }

    /// Defers teardown until the next push on the same task/thread, keeping
    /// the recorded error for that deferred pop.
    pub fn preserve(&self, error: Option<RpcError>) {
        *self.preserved.lock() = Some(Preserved { error });
    }

    /// Binds this context to the current task/thread.
    ///
    /// A preserved context left on top is force-popped first, with its
    /// preserved error. An application context is implicitly created and
    /// pushed when none is active for the same app.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] if force-popping a preserved context fails.
    pub fn push(self: &Arc<Self>) -> Result<(), ContextError> {
        if let Some(top) = request_ctx_stack().top() {
            let preserved = top.preserved.lock().take();
            if let Some(state) = preserved {
                top.pop(state.error.as_ref())?;
            }
        }

        let implicit = match app_ctx_stack().top() {
            Some(active) if Arc::ptr_eq(active.app(), &self.app) => None,
            _ => {
                let app_ctx = self.app.app_context();
                app_ctx.push();
                Some(app_ctx)
            }
        };
        self.implicit_app_ctx.lock().push(implicit);

        request_ctx_stack().push(Arc::clone(self));
        tracing::trace!(
            request_id = %self.request_id,
            method = self.request.method(),
            "request context pushed"
        );
        Ok(())
    }

    /// Unbinds this context from the current task/thread.
    ///
    /// Runs the request teardown callbacks (on the outermost pop), pops the
    /// request stack, then pops any implicitly created application context.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NotPushed`] if this context was never pushed
    /// and [`ContextError::WrongContext`] if it is not the current top of
    /// the stack.
    pub fn pop(self: &Arc<Self>, error: Option<&RpcError>) -> Result<(), ContextError> {
        let (implicit, run_teardown) = {
            let mut markers = self.implicit_app_ctx.lock();
            let implicit = markers.pop().ok_or(ContextError::NotPushed)?;
            (implicit, markers.is_empty())
        };

        let guard = RequestPopGuard {
            ctx: self,
            implicit,
            error,
        };

        if run_teardown {
            *self.preserved.lock() = None;
            self.app.do_teardown_request(error);
        }

        guard.finish()
    }
}

/// Unwinds the request stack and any implicitly created app context even
/// when a teardown callback panics out of [`RequestContext::pop`].
struct RequestPopGuard<'a> {
    ctx: &'a Arc<RequestContext>,
    implicit: Option<Arc<AppContext>>,
    error: Option<&'a RpcError>,
}

impl RequestPopGuard<'_> {
    fn finish(mut self) -> Result<(), ContextError> {
        let popped = request_ctx_stack().pop();
        let implicit = self.implicit.take();
        let (ctx, error) = (self.ctx, self.error);
        std::mem::forget(self);

        if let Some(app_ctx) = implicit {
            app_ctx.pop(error)?;
        }

        match popped {
            Some(top) if Arc::ptr_eq(&top, ctx) => Ok(()),
            _ => Err(ContextError::WrongContext),
        }
    }
}

impl Drop for RequestPopGuard<'_> {
    fn drop(&mut self) {
        let _ = request_ctx_stack().pop();
        if let Some(app_ctx) = self.implicit.take() {
            let _ = app_ctx.pop(self.error);
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("app", &self.app.name())
            .field("method", &self.request.method())
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}
