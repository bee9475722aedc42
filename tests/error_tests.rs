mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{get, test_app, tracing_util};
use http::{Method, StatusCode};
use waypoint::runtime_config::RuntimeConfig;
use waypoint::{Application, HttpError, Next, Request};

#[test]
fn test_not_found_document_and_headers() {
    let app = test_app();
    let res = get(&app, "/nowhere?x=1");
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.text().contains("<pre>Cannot GET /nowhere</pre>"));
    assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(res.header("content-security-policy"), Some("default-src 'none'"));
    assert_eq!(res.header("x-content-type-options"), Some("nosniff"));
    let length: usize = res.header("content-length").unwrap().parse().unwrap();
    assert_eq!(length, res.body().len());
}

#[test]
fn test_panic_after_responding_is_handled_once() {
    let app = test_app();
    let error_calls = Arc::new(AtomicUsize::new(0));
    app.get("/", |_req, res| {
        res.send("already answered");
        panic!("late failure");
    })
    .unwrap();
    let calls = error_calls.clone();
    app.use_error("/", move |_err, _req, _res| {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("still failing"))
    })
    .unwrap();

    let res = get(&app, "/");
    assert_eq!(error_calls.load(Ordering::SeqCst), 1);
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text(), "already answered");
}

#[test]
fn test_uncaught_panic_becomes_500() {
    let app = test_app();
    app.get("/", |_req, _res| panic!("handler bug")).unwrap();
    let res = get(&app, "/");
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.text().contains("handler bug"));
}

#[test]
fn test_error_status_outside_range_becomes_500() {
    let app = test_app();
    app.get("/", |_req, _res| {
        Err(HttpError::new(StatusCode::MOVED_PERMANENTLY, "not an error status").into())
    })
    .unwrap();
    assert_eq!(get(&app, "/").status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_response_error_status_is_kept() {
    let app = test_app();
    app.get("/", |_req, res| {
        res.set_status(StatusCode::SERVICE_UNAVAILABLE);
        Err(anyhow::anyhow!("maintenance"))
    })
    .unwrap();
    assert_eq!(get(&app, "/").status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn test_production_hides_error_details() {
    tracing_util::init();
    let app = Application::with_config(RuntimeConfig {
        env: "production".to_string(),
        ..RuntimeConfig::default()
    });
    app.get("/", |_req, _res| Err(anyhow::anyhow!("secret connection string")))
        .unwrap();
    let res = app.handle(Request::new(Method::GET, "/"));
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.text().contains("Internal Server Error"));
    assert!(!res.text().contains("secret"));
}

#[test]
fn test_env_setting_overrides_config() {
    let app = test_app();
    app.set("env", "production");
    app.get("/", |_req, _res| Err(anyhow::anyhow!("hidden"))).unwrap();
    assert!(!get(&app, "/").text().contains("hidden"));
}

#[test]
fn test_error_handler_replacing_error() {
    let app = test_app();
    app.get("/", |_req, _res| Err(anyhow::anyhow!("first"))).unwrap();
    app.use_error("/", |_err, _req, _res| {
        Err(HttpError::new(StatusCode::UNPROCESSABLE_ENTITY, "second").into())
    })
    .unwrap();
    app.use_error("/", |err, _req, res| {
        res.set_status(err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
            .send(err.to_string());
        Ok(Next::Done)
    })
    .unwrap();

    let res = get(&app, "/");
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.text(), "second");
}

#[test]
fn test_error_handler_forwarding_keeps_error() {
    let app = test_app();
    app.get("/", |_req, _res| Err(HttpError::new(StatusCode::FORBIDDEN, "denied").into()))
        .unwrap();
    app.use_error("/", |err, _req, _res| Err(err.clone().into())).unwrap();

    let res = get(&app, "/");
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[test]
fn test_error_handler_recovers_to_normal_mode() {
    let app = test_app();
    app.use_fn("/", |_req, _res| Err(anyhow::anyhow!("soft failure"))).unwrap();
    app.use_error("/", |_err, _req, _res| Ok(Next::Continue)).unwrap();
    app.get("/", |_req, res| {
        res.send("recovered");
        Ok(Next::Done)
    })
    .unwrap();
    assert_eq!(get(&app, "/").text(), "recovered");
}

#[test]
fn test_setup_errors_are_immediate() {
    let app = test_app();
    assert!(matches!(
        app.get("/a/:id(", |_req, _res| Ok(Next::Done)),
        Err(waypoint::SetupError::InvalidPattern { .. })
    ));
    assert!(matches!(
        app.use_handlers("/", Vec::new()),
        Err(waypoint::SetupError::MissingHandler(_))
    ));
}
