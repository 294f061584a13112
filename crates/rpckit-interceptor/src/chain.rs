//! The fixed-order interceptor chain.
//!
//! Composition is not configurable: the exception stage is outermost, the
//! lifecycle hook stage sits inside it, user interceptors nest inside that,
//! and the handler is innermost. Only the user interceptor list varies.

use std::sync::Arc;

use rpckit_core::{App, CallHandler, Request, Response, RpcError, StatusSink};

use crate::exception::ExceptionStage;
use crate::interceptor::Interceptor;
use crate::middleware::MiddlewareStage;

/// The transport-facing call pipeline.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use rpckit_core::App;
/// use rpckit_interceptor::InterceptorChain;
///
/// let app = Arc::new(App::new("echo"));
/// let chain = InterceptorChain::new(Arc::clone(&app));
/// ```
pub struct InterceptorChain {
    exception: ExceptionStage,
    middleware: MiddlewareStage,
}

impl InterceptorChain {
    /// Creates a chain for `app` with no user interceptors.
    #[must_use]
    pub fn new(app: Arc<App>) -> Self {
        Self::builder(app).build()
    }

    /// Creates a chain builder for `app`.
    #[must_use]
    pub fn builder(app: Arc<App>) -> InterceptorChainBuilder {
        InterceptorChainBuilder {
            app,
            interceptors: Vec::new(),
        }
    }

    /// Runs one call through the full pipeline.
    ///
    /// The transport supplies the wrapped request, the resolved handler, and
    /// the status sink its response path reports from.
    ///
    /// # Errors
    ///
    /// Returns an error only when debug mode re-raises it or context
    /// discipline is violated; every other failure is translated into a
    /// status on `sink` and a placeholder response.
    pub async fn handle(
        &self,
        request: Request,
        handler: &dyn CallHandler,
        sink: &mut dyn StatusSink,
    ) -> Result<Response, RpcError> {
        self.exception
            .run(request, &self.middleware, handler, sink)
            .await
    }

    /// The registered user interceptor names, in onion order.
    pub fn interceptor_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.middleware.interceptor_names()
    }
}

/// Builder collecting user interceptors for an [`InterceptorChain`].
pub struct InterceptorChainBuilder {
    app: Arc<App>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChainBuilder {
    /// Appends a user interceptor. Registration order is onion order, first
    /// registered outermost.
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

    /// Builds the chain.
    #[must_use]
    pub fn build(self) -> InterceptorChain {
        InterceptorChain {
            exception: ExceptionStage::new(Arc::clone(&self.app)),
            middleware: MiddlewareStage::new(self.app, self.interceptors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::FnInterceptor;
    use bytes::Bytes;
    use rpckit_core::{current_app, current_request, FnHandler, Metadata, StatusCode};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        code: Option<StatusCode>,
        message: Option<String>,
    }

    impl StatusSink for RecordingSink {
        fn set_status_code(&mut self, code: StatusCode) {
            self.code = Some(code);
        }

        fn set_status_message(&mut self, message: &str) {
            self.message = Some(message.to_string());
        }
    }

    fn request(method: &str) -> Request {
        Request::new(method, Bytes::new(), Metadata::new())
    }

    #[tokio::test]
    async fn test_full_pipeline_order() {
        tokio::spawn(async {
            let app = Arc::new(App::new("t"));
            let tape: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

            {
                let tape = Arc::clone(&tape);
                app.before_request(move |_request| {
                    let tape = Arc::clone(&tape);
                    Box::pin(async move {
                        tape.lock().expect("not poisoned").push("before".into());
                        Ok(None)
                    })
                });
            }
            {
                let tape = Arc::clone(&tape);
                app.after_request("after", move |response| {
                    let tape = Arc::clone(&tape);
                    Box::pin(async move {
                        tape.lock().expect("not poisoned").push("after".into());
                        Ok(response)
                    })
                });
            }
            {
                let tape = Arc::clone(&tape);
                app.teardown_request(move |_error| {
                    tape.lock().expect("not poisoned").push("teardown".into());
                });
            }

            let tape_i = Arc::clone(&tape);
            let chain = InterceptorChain::builder(Arc::clone(&app))
                .with_interceptor(FnInterceptor::new("user", move |request, next| {
                    let tape = Arc::clone(&tape_i);
                    Box::pin(async move {
                        tape.lock().expect("not poisoned").push("user>".into());
                        let response = next.run(request).await;
                        tape.lock().expect("not poisoned").push("<user".into());
                        response
                    })
                }))
                .build();

            let tape_h = Arc::clone(&tape);
            let handler = FnHandler::new(move |_request| {
                let tape = Arc::clone(&tape_h);
                Box::pin(async move {
                    tape.lock().expect("not poisoned").push("handler".into());
                    Ok(Response::from("handled"))
                })
            });

            let mut sink = RecordingSink::default();
            let response = chain
                .handle(request("/a.B/C"), &handler, &mut sink)
                .await
                .expect("call succeeds");

            assert_eq!(response, Response::from("handled"));
            assert_eq!(
                *tape.lock().expect("not poisoned"),
                vec!["before", "user>", "handler", "<user", "after", "teardown"]
            );
        })
        .await
        .expect("task panicked");
    }

    #[tokio::test]
    async fn test_ambient_accessors_inside_hooks_and_handler() {
        tokio::spawn(async {
            let app = Arc::new(App::new("ambient"));
            app.before_request(|_request| {
                Box::pin(async {
                    assert_eq!(current_app().expect("active").name(), "ambient");
                    assert!(current_request().is_ok());
                    Ok(None)
                })
            });

            let chain = InterceptorChain::new(Arc::clone(&app));
            let handler = FnHandler::new(|_request| {
                Box::pin(async {
                    let ctx = current_request().expect("active");
                    Ok(Response::new(Bytes::from(
                        ctx.request().method().to_string(),
                    )))
                })
            });

            let mut sink = RecordingSink::default();
            let response = chain
                .handle(request("/a.B/C"), &handler, &mut sink)
                .await
                .expect("call succeeds");
            assert_eq!(response.payload(), &Bytes::from_static(b"/a.B/C"));
            assert!(current_request().is_err());
            assert!(current_app().is_err());
        })
        .await
        .expect("task panicked");
    }

    #[tokio::test]
    async fn test_hook_error_is_translated_like_handler_error() {
        tokio::spawn(async {
            let app = Arc::new(App::new("t"));
            app.before_request(|_request| {
                Box::pin(async { Err(RpcError::status(StatusCode::Unauthenticated, "token?")) })
            });

            let chain = InterceptorChain::new(Arc::clone(&app));
            let handler =
                FnHandler::new(|_request| Box::pin(async { Ok(Response::from("handled")) }));

            let mut sink = RecordingSink::default();
            let response = chain
                .handle(request("/a.B/C"), &handler, &mut sink)
                .await
                .expect("translated");

            assert!(response.is_empty());
            assert_eq!(sink.code, Some(StatusCode::Unauthenticated));
            assert_eq!(sink.message.as_deref(), Some("token?"));
        })
        .await
        .expect("task panicked");
    }

    #[tokio::test]
    async fn test_empty_after_hook_reported_as_internal() {
        tokio::spawn(async {
            let app = Arc::new(App::new("t"));
            app.after_request("eraser", |_response| {
                Box::pin(async { Ok(Response::empty()) })
            });

            let chain = InterceptorChain::new(Arc::clone(&app));
            let handler =
                FnHandler::new(|_request| Box::pin(async { Ok(Response::from("handled")) }));

            let mut sink = RecordingSink::default();
            let response = chain
                .handle(request("/a.B/C"), &handler, &mut sink)
                .await
                .expect("masked");

            assert!(response.is_empty());
            assert_eq!(sink.code, Some(StatusCode::Internal));
            assert_eq!(sink.message.as_deref(), Some("Internal Error"));
        })
        .await
        .expect("task panicked");
    }

    #[tokio::test]
    async fn test_interceptor_names_in_order() {
        let app = Arc::new(App::new("t"));
        let chain = InterceptorChain::builder(app)
            .with_interceptor(FnInterceptor::new("first", |request, next| {
                Box::pin(async move { next.run(request).await })
            }))
            .with_interceptor(FnInterceptor::new("second", |request, next| {
                Box::pin(async move { next.run(request).await })
            }))
            .build();

        assert_eq!(
            chain.interceptor_names().collect::<Vec<_>>(),
            vec!["first", "second"]
        );
    }
}
