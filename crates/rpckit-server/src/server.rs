//! Server wiring.
//!
//! A [`Server`] ties together the application object, the interceptor chain,
//! loaded TLS credentials, and a [`Transport`]. The crate ships no network
//! transport; the trait is the boundary a transport implements, and tests
//! drive it with an in-process channel.

use std::sync::Arc;

use rpckit_core::{App, BoxFuture};
use rpckit_interceptor::{Interceptor, InterceptorChain};
use rpckit_telemetry::{init_logging, LogConfig};

use crate::dispatch::Dispatcher;
use crate::error::ServerError;
use crate::shutdown::ShutdownSignal;
use crate::tls::{load_credentials, TlsCredentials};

/// Serves calls against a [`Dispatcher`] until shutdown.
///
/// Implementations own the wire: they accept calls from somewhere, build a
/// [`Request`](rpckit_core::Request) for each, await
/// [`Dispatcher::dispatch`], and report the outcome back. `serve` must return
/// once `shutdown` triggers.
pub trait Transport: Send + Sync {
    /// Serves calls until `shutdown` triggers.
    fn serve(
        &self,
        dispatcher: Arc<Dispatcher>,
        shutdown: ShutdownSignal,
    ) -> BoxFuture<'static, Result<(), ServerError>>;
}

/// A configured server, ready to hand its dispatcher to a transport.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use rpckit_core::App;
/// use rpckit_server::Server;
///
/// let app = Arc::new(App::new("echo"));
/// let server = Server::builder(app).build().expect("no TLS configured");
/// assert_eq!(server.app().name(), "echo");
/// ```
pub struct Server {
    app: Arc<App>,
    dispatcher: Arc<Dispatcher>,
    tls: Option<TlsCredentials>,
}

impl Server {
    /// Creates a builder for `app`.
    #[must_use]
    pub fn builder(app: Arc<App>) -> ServerBuilder {
        ServerBuilder {
            app,
            interceptors: Vec::new(),
            init_logging: false,
        }
    }

    /// The application object.
    #[must_use]
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// The call dispatcher handed to transports.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The loaded TLS credentials, when configured.
    #[must_use]
    pub fn tls(&self) -> Option<&TlsCredentials> {
        self.tls.as_ref()
    }

    /// Runs `transport` until the process receives a shutdown signal.
    ///
    /// # Errors
    ///
    /// Propagates transport failures after draining in-flight calls.
    pub async fn run<T: Transport>(&self, transport: &T) -> Result<(), ServerError> {
        self.run_with_shutdown(transport, ShutdownSignal::with_os_signals())
            .await
    }

    /// Runs `transport` until `shutdown` triggers, then drains in-flight
    /// calls before returning.
    ///
    /// # Errors
    ///
    /// Propagates transport failures after draining in-flight calls.
    pub async fn run_with_shutdown<T: Transport>(
        &self,
        transport: &T,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        tracing::info!(
            app = self.app.name(),
            max_workers = self.app.config().server.max_workers,
            tls = self.tls.is_some(),
            "server starting"
        );

        let result = transport
            .serve(Arc::clone(&self.dispatcher), shutdown)
            .await;

        self.dispatcher.close();
        let in_flight = self.dispatcher.in_flight();
        if in_flight > 0 {
            tracing::info!(in_flight, "waiting for in-flight calls");
        }
        self.dispatcher.drain().await;
        tracing::info!("server stopped");

        result
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("app", &self.app.name())
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder wiring an [`App`] into a [`Server`].
pub struct ServerBuilder {
    app: Arc<App>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    init_logging: bool,
}

impl ServerBuilder {
    /// Appends a user interceptor. Registration order is onion order.
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Appends an already shared user interceptor.
    #[must_use]
    pub fn with_shared_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Initializes process-wide logging from the app's `[log]` section
    /// during [`build`](Self::build). Off by default so embedding programs
    /// and tests keep control of their subscriber.
    #[must_use]
    pub fn with_logging(mut self) -> Self {
        self.init_logging = true;
        self
    }

    /// Builds the server: initializes logging when requested, loads TLS
    /// credentials, and assembles the interceptor chain and dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::TlsFile`] when a configured credential file
    /// cannot be read, and [`ServerError::LoggingInit`] when logging was
    /// requested but a subscriber is already installed.
    pub fn build(self) -> Result<Server, ServerError> {
        if self.init_logging {
            init_logging(&log_config(&self.app))?;
        }

        let tls = load_credentials(&self.app.config().tls)?;

        let mut chain = InterceptorChain::builder(Arc::clone(&self.app));
        for interceptor in self.interceptors {
            chain = chain.with_shared_interceptor(interceptor);
        }
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&self.app), chain.build()));

        Ok(Server {
            app: self.app,
            dispatcher,
            tls,
        })
    }
}

fn log_config(app: &App) -> LogConfig {
    let log = &app.config().log;
    LogConfig {
        level: log.level.clone(),
        json_format: log.json,
        file_line_info: app.debug(),
        ..LogConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::CallOutcome;
    use bytes::Bytes;
    use rpckit_config::RpckitConfig;
    use rpckit_core::{Metadata, Request, Response, RpcError, Service, StatusCode};
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot, Mutex};

    type Reply = oneshot::Sender<Result<CallOutcome, RpcError>>;

    /// In-process transport: calls arrive over a channel, outcomes go back
    /// over a oneshot per call.
    struct ChannelTransport {
        calls: Mutex<Option<mpsc::Receiver<(Request, Reply)>>>,
    }

    impl ChannelTransport {
        fn new() -> (Self, mpsc::Sender<(Request, Reply)>) {
            let (sender, receiver) = mpsc::channel(16);
            (
                Self {
                    calls: Mutex::new(Some(receiver)),
                },
                sender,
            )
        }
    }

    impl Transport for ChannelTransport {
        fn serve(
            &self,
            dispatcher: Arc<Dispatcher>,
            shutdown: ShutdownSignal,
        ) -> BoxFuture<'static, Result<(), ServerError>> {
            let receiver = self.calls.try_lock().ok().and_then(|mut slot| slot.take());
            Box::pin(async move {
                let mut receiver =
                    receiver.ok_or_else(|| ServerError::transport("transport already serving"))?;
                loop {
                    tokio::select! {
                        call = receiver.recv() => {
                            let Some((request, reply)) = call else { break };
                            let dispatcher = Arc::clone(&dispatcher);
                            tokio::spawn(async move {
                                let outcome = dispatcher.dispatch(request).await;
                                let _ = reply.send(outcome);
                            });
                        }
                        () = shutdown.recv() => break,
                    }
                }
                Ok(())
            })
        }
    }

    fn echo_app() -> Arc<App> {
        let app = Arc::new(App::new("echo"));
        let mut service = Service::new("echo.Echo");
        service
            .add_fn("Ping", |request| {
                let payload = request.payload().clone();
                Box::pin(async move { Ok(Response::new(payload)) })
            })
            .expect("fresh method");
        app.add_service(service).expect("fresh service");
        app
    }

    async fn call(
        sender: &mpsc::Sender<(Request, Reply)>,
        method: &str,
        payload: &'static [u8],
    ) -> Result<CallOutcome, RpcError> {
        let (reply, response) = oneshot::channel();
        let request = Request::new(method, Bytes::from_static(payload), Metadata::new());
        sender.send((request, reply)).await.expect("transport alive");
        response.await.expect("reply delivered")
    }

    #[tokio::test]
    async fn test_serve_and_shutdown_over_channel_transport() {
        let server = Arc::new(
            Server::builder(echo_app())
                .build()
                .expect("no TLS configured"),
        );
        let (transport, sender) = ChannelTransport::new();
        let shutdown = ShutdownSignal::new();

        let running = {
            let server = Arc::clone(&server);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { server.run_with_shutdown(&transport, shutdown).await })
        };

        let outcome = call(&sender, "/echo.Echo/Ping", b"hello")
            .await
            .expect("call succeeds");
        assert_eq!(outcome.response().payload(), &Bytes::from_static(b"hello"));
        assert!(outcome.status().is_ok());

        let outcome = call(&sender, "/echo.Echo/Missing", b"")
            .await
            .expect("translated");
        assert_eq!(outcome.status().code(), StatusCode::NotFound);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), running)
            .await
            .expect("server stops")
            .expect("task panicked")
            .expect("serve succeeds");

        // after shutdown the dispatcher rejects new calls
        let request = Request::new("/echo.Echo/Ping", Bytes::new(), Metadata::new());
        let result = server.dispatcher().dispatch(request).await;
        assert!(matches!(result, Err(RpcError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_builder_wires_interceptors() {
        use rpckit_interceptor::FnInterceptor;

        let server = Server::builder(echo_app())
            .with_interceptor(FnInterceptor::new("stamp", |request, next| {
                Box::pin(async move {
                    let response = next.run(request).await?;
                    let mut payload = response.payload().to_vec();
                    payload.extend_from_slice(b"!");
                    Ok(Response::new(Bytes::from(payload)))
                })
            }))
            .build()
            .expect("no TLS configured");

        let request = Request::new("/echo.Echo/Ping", Bytes::from_static(b"hi"), Metadata::new());
        let outcome = tokio::spawn({
            let dispatcher = Arc::clone(server.dispatcher());
            async move { dispatcher.dispatch(request).await }
        })
        .await
        .expect("task panicked")
        .expect("call succeeds");
        assert_eq!(outcome.response().payload(), &Bytes::from_static(b"hi!"));
    }

    #[tokio::test]
    async fn test_build_fails_on_missing_tls_file() {
        let mut config = RpckitConfig::default();
        config.tls.cert = Some("/nonexistent/server.pem".into());
        config.tls.key = Some("/nonexistent/server.key".into());
        let app = Arc::new(App::with_config("t", config));

        match Server::builder(app).build() {
            Err(ServerError::TlsFile { path, .. }) => {
                assert_eq!(path, std::path::PathBuf::from("/nonexistent/server.pem"));
            }
            other => panic!("expected TlsFile error, got {other:?}"),
        }
    }

    #[test]
    fn test_log_config_follows_app_config() {
        let mut config = RpckitConfig::default();
        config.log.level = "debug".to_string();
        config.log.json = true;
        let app = App::with_config("t", config);

        let log = log_config(&app);
        assert_eq!(log.level, "debug");
        assert!(log.json_format);
        assert!(!log.file_line_info);
    }
}
