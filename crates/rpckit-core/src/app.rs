//! The application object.
//!
//! An [`App`] owns the configuration, the method router, and the tables of
//! startup-registered callbacks: before/after request hooks, teardown
//! callbacks, and error handlers. Registration is append-only and happens
//! before serving; during serving the tables are only read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rpckit_config::RpckitConfig;

use crate::ctx::{AppContext, RequestContext};
use crate::error::{ErrorKind, RpcError};
use crate::service::{BoxFuture, CallHandler, Router, Service, SetupError};
use crate::wrapper::{Request, Response, StatusSink};

/// A before-request hook.
///
/// Runs before the handler; returning `Some(response)` short-circuits the
/// rest of the chain.
pub type BeforeHook = Arc<
    dyn for<'a> Fn(&'a Request) -> BoxFuture<'a, Result<Option<Response>, RpcError>> + Send + Sync,
>;

/// An after-request hook function.
///
/// Receives the response produced so far and must return a non-empty
/// replacement.
pub type AfterHookFn =
    Arc<dyn Fn(Response) -> BoxFuture<'static, Result<Response, RpcError>> + Send + Sync>;

/// A named after-request hook.
///
/// The name identifies the hook in the error raised when it returns an
/// empty response.
#[derive(Clone)]
pub struct AfterHook {
    /// Hook name, used in diagnostics.
    pub name: String,
    /// The hook function.
    pub func: AfterHookFn,
}

/// A teardown callback, receiving the error that ended the context, if any.
pub type TeardownHook = Arc<dyn Fn(Option<&RpcError>) + Send + Sync>;

/// An error handler.
///
/// Receives the escaped error and the call's status sink, and produces the
/// response returned to the caller.
pub type ErrorHandlerFn = Arc<dyn Fn(&RpcError, &mut dyn StatusSink) -> Response + Send + Sync>;

/// The central application object.
///
/// # Example
///
/// ```
/// use rpckit_core::App;
///
/// let app = App::new("echo");
/// app.before_request(|_request| Box::pin(async { Ok(None) }));
/// app.teardown_request(|_error| {});
/// ```
pub struct App {
    name: String,
    config: RpckitConfig,
    debug: AtomicBool,
    router: RwLock<Router>,
    before_request: RwLock<Vec<BeforeHook>>,
    after_request: RwLock<Vec<AfterHook>>,
    teardown_app_context: RwLock<Vec<TeardownHook>>,
    teardown_request: RwLock<Vec<TeardownHook>>,
    error_handlers: RwLock<HashMap<ErrorKind, ErrorHandlerFn>>,
}

impl App {
    /// Creates an app with the default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, RpckitConfig::default())
    }

    /// Creates an app with an explicit configuration.
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: RpckitConfig) -> Self {
        let debug = AtomicBool::new(config.debug);
        Self {
            name: name.into(),
            config,
            debug,
            router: RwLock::new(Router::new()),
            before_request: RwLock::new(Vec::new()),
            after_request: RwLock::new(Vec::new()),
            teardown_app_context: RwLock::new(Vec::new()),
            teardown_request: RwLock::new(Vec::new()),
            error_handlers: RwLock::new(HashMap::new()),
        }
    }

    /// The application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The application configuration.
    #[must_use]
    pub fn config(&self) -> &RpckitConfig {
        &self.config
    }

    /// Whether debug mode is active.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Toggles debug mode. Intended for use before serving starts.
    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    /// Registers a before-request hook.
    ///
    /// Hooks run in registration order; the first one returning
    /// `Some(response)` short-circuits the chain.
    pub fn before_request<F>(&self, hook: F)
    where
        F: for<'a> Fn(&'a Request) -> BoxFuture<'a, Result<Option<Response>, RpcError>>
            + Send
            + Sync
            + 'static,
    {
        self.before_request.write().push(Arc::new(hook));
    }

    /// Registers a named after-request hook.
    ///
    /// Hooks run in registration order and must each return a non-empty
    /// response; an empty one fails the call naming the hook.
    pub fn after_request<F>(&self, name: impl Into<String>, hook: F)
    where
        F: Fn(Response) -> BoxFuture<'static, Result<Response, RpcError>> + Send + Sync + 'static,
    {
        self.after_request.write().push(AfterHook {
            name: name.into(),
            func: Arc::new(hook),
        });
    }

    /// Registers a teardown callback for the application context.
    pub fn teardown_app_context<F>(&self, hook: F)
    where
        F: Fn(Option<&RpcError>) + Send + Sync + 'static,
    {
        self.teardown_app_context.write().push(Arc::new(hook));
    }

    /// Registers a teardown callback for the request context.
    pub fn teardown_request<F>(&self, hook: F)
    where
        F: Fn(Option<&RpcError>) + Send + Sync + 'static,
    {
        self.teardown_request.write().push(Arc::new(hook));
    }

    /// Registers an error handler for a kind of error.
    ///
    /// Handlers are looked up along the error's kind chain, most derived
    /// first, so a handler for [`ErrorKind::Client`] catches every
    /// client-classified error without a more specific handler.
    pub fn register_error_handler<F>(&self, kind: ErrorKind, handler: F)
    where
        F: Fn(&RpcError, &mut dyn StatusSink) -> Response + Send + Sync + 'static,
    {
        self.error_handlers.write().insert(kind, Arc::new(handler));
    }

    /// Registers a service on the router.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::DuplicateService`] if the service name is
    /// already taken.
    pub fn add_service(&self, service: Service) -> Result<(), SetupError> {
        self.router.write().add_service(service)
    }

    /// Looks up the handler for a full method name.
    #[must_use]
    pub fn lookup_handler(&self, full_method: &str) -> Option<Arc<dyn CallHandler>> {
        self.router.read().lookup(full_method)
    }

    /// Snapshot of the registered before-request hooks, in order.
    #[must_use]
    pub fn before_hooks(&self) -> Vec<BeforeHook> {
        self.before_request.read().clone()
    }

    /// Snapshot of the registered after-request hooks, in order.
    #[must_use]
    pub fn after_hooks(&self) -> Vec<AfterHook> {
        self.after_request.read().clone()
    }

    /// Finds the handler for `error`, walking its kind chain most derived
    /// first.
    #[must_use]
    pub fn error_handler_for(&self, error: &RpcError) -> Option<ErrorHandlerFn> {
        let handlers = self.error_handlers.read();
        error
            .kind()
            .chain()
            .into_iter()
            .find_map(|kind| handlers.get(&kind).map(Arc::clone))
    }

    /// Runs the app-context teardown callbacks in reverse registration
    /// order.
    pub fn do_teardown_app_context(&self, error: Option<&RpcError>) {
        let hooks = self.teardown_app_context.read().clone();
        for hook in hooks.iter().rev() {
            hook(error);
        }
    }

    /// Runs the request teardown callbacks in reverse registration order.
    pub fn do_teardown_request(&self, error: Option<&RpcError>) {
        let hooks = self.teardown_request.read().clone();
        for hook in hooks.iter().rev() {
            hook(error);
        }
    }

    /// Creates an application context bound to this app.
    #[must_use]
    pub fn app_context(self: &Arc<Self>) -> Arc<AppContext> {
        AppContext::new(Arc::clone(self))
    }

    /// Creates a request context bound to this app.
    #[must_use]
    pub fn request_context(self: &Arc<Self>, request: Request) -> Arc<RequestContext> {
        RequestContext::new(Arc::clone(self), request)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("debug", &self.debug())
            .finish_non_exhaustive()
    }
}
