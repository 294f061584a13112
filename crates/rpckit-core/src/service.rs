//! Service registration and method routing.
//!
//! A [`Service`] is a named bundle of call handlers; the [`Router`] maps
//! full method names (`/pkg.Service/Method`) to handlers. Registration
//! mistakes are [`SetupError`]s and fail fast at startup; a lookup miss at
//! call time is the caller's problem and maps to status `NOT_FOUND`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::error::RpcError;
use crate::wrapper::{Request, Response};

/// A boxed future, as returned by call handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised while wiring up services.
///
/// These are programming errors; they are reported at registration or bind
/// time and never reach a caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// A service with the same name was already registered.
    #[error("duplicate service registration: {service}")]
    DuplicateService {
        /// The qualified service name.
        service: String,
    },

    /// A method with the same name was already registered on the service.
    #[error("duplicate method registration: {service}/{method}")]
    DuplicateMethod {
        /// The qualified service name.
        service: String,
        /// The method name.
        method: String,
    },

    /// A referenced service was never registered.
    #[error("unknown service: {service}")]
    UnknownService {
        /// The qualified service name.
        service: String,
    },
}

/// An async call handler.
///
/// Handlers receive the wrapped [`Request`] and produce a [`Response`] or an
/// [`RpcError`]. Ambient context accessors are available inside the handler
/// body because the exception stage pushes the request context before the
/// handler runs.
pub trait CallHandler: Send + Sync {
    /// Handles one call.
    fn call<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, RpcError>>;
}

/// Adapter turning a closure into a [`CallHandler`].
///
/// # Example
///
/// ```
/// use rpckit_core::{FnHandler, Response};
///
/// let handler = FnHandler::new(|_request| {
///     Box::pin(async { Ok(Response::from("pong")) })
/// });
/// ```
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: for<'a> Fn(&'a Request) -> BoxFuture<'a, Result<Response, RpcError>> + Send + Sync,
{
    /// Wraps `func` as a call handler.
    #[must_use]
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> CallHandler for FnHandler<F>
where
    F: for<'a> Fn(&'a Request) -> BoxFuture<'a, Result<Response, RpcError>> + Send + Sync,
{
    fn call<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, RpcError>> {
        (self.func)(request)
    }
}

/// A named service holding its method handlers.
pub struct Service {
    name: String,
    methods: HashMap<String, Arc<dyn CallHandler>>,
}

impl Service {
    /// Creates an empty service with the qualified name `name`
    /// (e.g. `echo.Echo`).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    /// The qualified service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a handler for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::DuplicateMethod`] if the method was already
    /// registered.
    pub fn add_method(
        &mut self,
        method: impl Into<String>,
        handler: Arc<dyn CallHandler>,
    ) -> Result<(), SetupError> {
        let method = method.into();
        if self.methods.contains_key(&method) {
            return Err(SetupError::DuplicateMethod {
                service: self.name.clone(),
                method,
            });
        }
        self.methods.insert(method, handler);
        Ok(())
    }

    /// Registers a closure as the handler for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::DuplicateMethod`] if the method was already
    /// registered.
    pub fn add_fn<F>(&mut self, method: impl Into<String>, func: F) -> Result<(), SetupError>
    where
        F: for<'a> Fn(&'a Request) -> BoxFuture<'a, Result<Response, RpcError>>
            + Send
            + Sync
            + 'static,
    {
        self.add_method(method, Arc::new(FnHandler::new(func)))
    }

    /// Looks up the handler for `method`.
    #[must_use]
    pub fn handler(&self, method: &str) -> Option<Arc<dyn CallHandler>> {
        self.methods.get(method).map(Arc::clone)
    }

    /// The registered method names.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Maps full method names to call handlers.
#[derive(Debug, Default)]
pub struct Router {
    services: HashMap<String, Service>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::DuplicateService`] if a service with the same
    /// name was already registered.
    pub fn add_service(&mut self, service: Service) -> Result<(), SetupError> {
        if self.services.contains_key(service.name()) {
            return Err(SetupError::DuplicateService {
                service: service.name().to_string(),
            });
        }
        self.services.insert(service.name().to_string(), service);
        Ok(())
    }

    /// Looks up the handler for a full method name (`/pkg.Service/Method`).
    #[must_use]
    pub fn lookup(&self, full_method: &str) -> Option<Arc<dyn CallHandler>> {
        let rest = full_method.strip_prefix('/')?;
        let (service, method) = rest.split_once('/')?;
        self.services.get(service)?.handler(method)
    }

    /// Returns the registered service names.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::wrapper::Metadata;

    fn ping_service() -> Service {
        let mut service = Service::new("echo.Echo");
        service
            .add_fn("Ping", |_request| {
                Box::pin(async { Ok(Response::from("pong")) })
            })
            .expect("fresh method");
        service
    }

    #[tokio::test]
    async fn test_lookup_and_call() {
        let mut router = Router::new();
        router.add_service(ping_service()).expect("fresh service");

        let handler = router.lookup("/echo.Echo/Ping").expect("registered");
        let request = Request::new("/echo.Echo/Ping", Bytes::new(), Metadata::new());
        let response = handler.call(&request).await.expect("handler succeeds");
        assert_eq!(response.payload(), &Bytes::from_static(b"pong"));
    }

    #[test]
    fn test_lookup_miss() {
        let mut router = Router::new();
        router.add_service(ping_service()).expect("fresh service");

        assert!(router.lookup("/echo.Echo/Pong").is_none());
        assert!(router.lookup("/other.Service/Ping").is_none());
        assert!(router.lookup("garbage").is_none());
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut service = ping_service();
        let result = service.add_fn("Ping", |_request| {
            Box::pin(async { Ok(Response::empty()) })
        });
        assert_eq!(
            result,
            Err(SetupError::DuplicateMethod {
                service: "echo.Echo".to_string(),
                method: "Ping".to_string(),
            })
        );
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let mut router = Router::new();
        router.add_service(ping_service()).expect("fresh service");
        let result = router.add_service(Service::new("echo.Echo"));
        assert_eq!(
            result,
            Err(SetupError::DuplicateService {
                service: "echo.Echo".to_string(),
            })
        );
    }
}
