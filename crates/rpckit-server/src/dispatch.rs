//! Call dispatch at the transport boundary.
//!
//! A [`Dispatcher`] is what a transport holds: it resolves the handler for
//! each incoming call, enforces the configured concurrency and message size
//! limits, and drives the interceptor chain. The [`CallStatus`] it returns is
//! the default [`StatusSink`] implementation; transports copy its code and
//! message onto the wire however they see fit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rpckit_core::{
    App, BoxFuture, CallHandler, Request, Response, RpcError, StatusCode, StatusSink,
};
use rpckit_interceptor::InterceptorChain;
use tokio::sync::{Notify, Semaphore};

/// The status reported for one call.
///
/// Starts as `OK` with an empty message; error handlers and the exception
/// stage overwrite it through the [`StatusSink`] trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStatus {
    code: StatusCode,
    message: String,
}

impl CallStatus {
    /// Creates a fresh `OK` status.
    #[must_use]
    pub fn new() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    /// The status code.
    #[must_use]
    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// The status detail message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the call ended successfully.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl Default for CallStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for CallStatus {
    fn set_status_code(&mut self, code: StatusCode) {
        self.code = code;
    }

    fn set_status_message(&mut self, message: &str) {
        self.message = message.to_string();
    }
}

/// The response and final status of one dispatched call.
#[derive(Debug)]
pub struct CallOutcome {
    response: Response,
    status: CallStatus,
}

impl CallOutcome {
    /// The response payload.
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// The final call status.
    #[must_use]
    pub fn status(&self) -> &CallStatus {
        &self.status
    }

    /// Decomposes the outcome.
    #[must_use]
    pub fn into_parts(self) -> (Response, CallStatus) {
        (self.response, self.status)
    }
}

/// Handler substituted when the router has no entry for the method.
///
/// Routed through the full chain so lifecycle hooks and teardown callbacks
/// still observe the call.
struct UnknownMethod;

impl CallHandler for UnknownMethod {
    fn call<'a>(&'a self, _request: &'a Request) -> BoxFuture<'a, Result<Response, RpcError>> {
        Box::pin(async { Err(RpcError::status(StatusCode::NotFound, "method not found")) })
    }
}

/// Tracks calls currently inside the chain, for shutdown draining.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard<'a>(&'a InFlight);

impl<'a> InFlightGuard<'a> {
    fn enter(tracker: &'a InFlight) -> Self {
        tracker.count.fetch_add(1, Ordering::SeqCst);
        Self(tracker)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let prev = self.0.count.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Dispatches calls from a transport into the interceptor chain.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use rpckit_core::App;
/// use rpckit_interceptor::InterceptorChain;
/// use rpckit_server::Dispatcher;
///
/// let app = Arc::new(App::new("echo"));
/// let chain = InterceptorChain::new(Arc::clone(&app));
/// let dispatcher = Dispatcher::new(app, chain);
/// assert_eq!(dispatcher.in_flight(), 0);
/// ```
pub struct Dispatcher {
    app: Arc<App>,
    chain: InterceptorChain,
    permits: Semaphore,
    in_flight: InFlight,
    max_receive: usize,
    max_send: usize,
}

impl Dispatcher {
    /// Creates a dispatcher for `app` driving `chain`.
    ///
    /// Concurrency and message size limits come from the app's server
    /// configuration.
    #[must_use]
    pub fn new(app: Arc<App>, chain: InterceptorChain) -> Self {
        let server = &app.config().server;
        let permits = Semaphore::new(server.max_workers);
        let max_receive = server.max_receive_message_length;
        let max_send = server.max_send_message_length;
        Self {
            app,
            chain,
            permits,
            in_flight: InFlight::default(),
            max_receive,
            max_send,
        }
    }

    /// The app this dispatcher serves.
    #[must_use]
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// The number of calls currently executing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Dispatches one call.
    ///
    /// Waits for a worker permit, resolves the handler, and runs the full
    /// chain. An unknown method is reported as `NOT_FOUND` through the chain
    /// so hooks and teardown callbacks still run. Payloads over the
    /// configured receive limit, and responses over the send limit, are cut
    /// off with `RESOURCE_EXHAUSTED` without entering the chain.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Unavailable`] after [`close`](Self::close);
    /// otherwise only errors the chain re-raises (debug mode, context
    /// discipline) escape here. Translated failures come back as a
    /// successful outcome carrying the error status.
    pub async fn dispatch(&self, request: Request) -> Result<CallOutcome, RpcError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RpcError::unavailable("server is shutting down"))?;
        let _guard = InFlightGuard::enter(&self.in_flight);

        if request.payload().len() > self.max_receive {
            tracing::warn!(
                method = request.method(),
                size = request.payload().len(),
                limit = self.max_receive,
                "received message exceeds configured maximum"
            );
            return Ok(Self::exhausted("received message exceeds the configured maximum"));
        }

        let handler = self.app.lookup_handler(request.method());
        let mut status = CallStatus::new();
        let response = match handler {
            Some(handler) => {
                self.chain
                    .handle(request, handler.as_ref(), &mut status)
                    .await?
            }
            None => self.chain.handle(request, &UnknownMethod, &mut status).await?,
        };

        if response.payload().len() > self.max_send {
            tracing::warn!(
                size = response.payload().len(),
                limit = self.max_send,
                "response exceeds configured maximum"
            );
            return Ok(Self::exhausted("sent message exceeds the configured maximum"));
        }

        Ok(CallOutcome { response, status })
    }

    /// Stops accepting new calls. Calls already holding a permit finish
    /// normally.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Waits until no call is in flight. Completes immediately when idle.
    pub async fn drain(&self) {
        loop {
            // register for the wakeup before checking the count; the last
            // call may finish between the load and the await otherwise
            let idle = self.in_flight.idle.notified();
            if self.in_flight.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }

    fn exhausted(message: &str) -> CallOutcome {
        let mut status = CallStatus::new();
        status.set_status_code(StatusCode::ResourceExhausted);
        status.set_status_message(message);
        CallOutcome {
            response: Response::empty(),
            status,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("app", &self.app.name())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
