//! End-to-end pipeline tests through the facade crate.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rpckit::prelude::*;

fn request(method: &str, payload: &'static [u8]) -> Request {
    Request::new(method, Bytes::from_static(payload), Metadata::new())
}

fn greeter_app() -> Arc<App> {
    let app = Arc::new(App::new("greeter"));
    let mut service = Service::new("greeter.Greeter");
    service
        .add_fn("Hello", |request| {
            let name = String::from_utf8_lossy(request.payload()).to_string();
            Box::pin(async move { Ok(Response::new(Bytes::from(format!("hello {name}")))) })
        })
        .expect("fresh method");
    service
        .add_fn("Missing", |_request| {
            Box::pin(async { Err(RpcError::not_found("nobody here")) })
        })
        .expect("fresh method");
    app.add_service(service).expect("fresh service");
    app
}

#[tokio::test]
async fn hooks_interceptors_and_handler_share_one_request_context() {
    tokio::spawn(async {
        let app = greeter_app();

        // the before hook stashes a value the handler reads back through the
        // ambient scratch accessor
        app.before_request(|_request| {
            Box::pin(async {
                scratch()
                    .expect("app context active")
                    .insert("greeting", serde_json_value("ahoy"));
                Ok(None)
            })
        });

        let seen_method = Arc::new(Mutex::new(String::new()));
        {
            let seen_method = Arc::clone(&seen_method);
            app.teardown_request(move |_error| {
                if let Ok(ctx) = current_request() {
                    *seen_method.lock().expect("not poisoned") = ctx.request().method().to_string();
                }
            });
        }

        let mut service = Service::new("scratch.Scratch");
        service
            .add_fn("Read", |_request| {
                Box::pin(async {
                    let value = scratch()
                        .expect("app context active")
                        .get("greeting")
                        .expect("stashed by the before hook");
                    let text = value.as_str().expect("string value").to_string();
                    Ok(Response::new(Bytes::from(text)))
                })
            })
            .expect("fresh method");
        app.add_service(service).expect("fresh service");

        let server = Server::builder(Arc::clone(&app))
            .build()
            .expect("no TLS configured");

        let outcome = server
            .dispatcher()
            .dispatch(request("/scratch.Scratch/Read", b""))
            .await
            .expect("call succeeds");
        assert_eq!(outcome.response().payload(), &Bytes::from_static(b"ahoy"));
        assert_eq!(
            *seen_method.lock().expect("not poisoned"),
            "/scratch.Scratch/Read"
        );
        // context unwound after the call
        assert!(current_request().is_err());
    })
    .await
    .expect("task panicked");
}

fn serde_json_value(text: &str) -> serde_json::Value {
    serde_json::Value::String(text.to_string())
}

#[tokio::test]
async fn typed_error_reaches_the_status_verbatim() {
    tokio::spawn(async {
        let app = greeter_app();
        let server = Server::builder(app).build().expect("no TLS configured");

        let outcome = server
            .dispatcher()
            .dispatch(request("/greeter.Greeter/Missing", b""))
            .await
            .expect("translated");
        assert_eq!(outcome.status().code(), StatusCode::NotFound);
        assert_eq!(outcome.status().message(), "nobody here");
        assert!(outcome.response().is_empty());
    })
    .await
    .expect("task panicked");
}

#[tokio::test]
async fn custom_error_handler_shapes_the_response() {
    tokio::spawn(async {
        let app = greeter_app();
        app.register_error_handler(rpckit::core::ErrorKind::NotFound, |_error, sink| {
            sink.set_status_code(StatusCode::Ok);
            sink.set_status_message("");
            Response::from("default greeting")
        });

        let server = Server::builder(app).build().expect("no TLS configured");
        let outcome = server
            .dispatcher()
            .dispatch(request("/greeter.Greeter/Missing", b""))
            .await
            .expect("handled");
        assert!(outcome.status().is_ok());
        assert_eq!(
            outcome.response().payload(),
            &Bytes::from_static(b"default greeting")
        );
    })
    .await
    .expect("task panicked");
}

#[tokio::test]
async fn interceptor_observes_every_call() {
    tokio::spawn(async {
        let app = greeter_app();
        let methods: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let tape = Arc::clone(&methods);

        let server = Server::builder(app)
            .with_interceptor(FnInterceptor::new("audit", move |request, next| {
                let tape = Arc::clone(&tape);
                Box::pin(async move {
                    tape.lock()
                        .expect("not poisoned")
                        .push(request.method().to_string());
                    next.run(request).await
                })
            }))
            .build()
            .expect("no TLS configured");

        server
            .dispatcher()
            .dispatch(request("/greeter.Greeter/Hello", b"crew"))
            .await
            .expect("call succeeds");
        server
            .dispatcher()
            .dispatch(request("/greeter.Greeter/Missing", b""))
            .await
            .expect("translated");

        assert_eq!(
            *methods.lock().expect("not poisoned"),
            vec!["/greeter.Greeter/Hello", "/greeter.Greeter/Missing"]
        );
    })
    .await
    .expect("task panicked");
}

#[tokio::test]
async fn debug_mode_reraises_with_detail() {
    tokio::spawn(async {
        let app = greeter_app();
        app.set_debug(true);

        let server = Server::builder(app).build().expect("no TLS configured");
        let err = server
            .dispatcher()
            .dispatch(request("/greeter.Greeter/Missing", b""))
            .await
            .expect_err("debug mode re-raises");
        assert!(format!("{err}").contains("nobody here"));
    })
    .await
    .expect("task panicked");
}

#[tokio::test]
async fn production_mode_masks_unregistered_server_errors() {
    tokio::spawn(async {
        let app = Arc::new(App::new("fragile"));
        let mut service = Service::new("fragile.Fragile");
        service
            .add_fn("Break", |_request| {
                Box::pin(async { Err(RpcError::internal("connection string leaked")) })
            })
            .expect("fresh method");
        app.add_service(service).expect("fresh service");

        let server = Server::builder(app).build().expect("no TLS configured");
        let outcome = server
            .dispatcher()
            .dispatch(request("/fragile.Fragile/Break", b""))
            .await
            .expect("masked");
        assert_eq!(outcome.status().code(), StatusCode::Internal);
        assert_eq!(outcome.status().message(), "Internal Error");
        assert!(!outcome.status().message().contains("connection string"));
    })
    .await
    .expect("task panicked");
}
