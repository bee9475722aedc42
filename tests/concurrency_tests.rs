mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{test_app, test_server};
use http::header::HeaderValue;
use http::{Method, StatusCode};
use waypoint::{Next, Request};

#[test]
fn test_spawned_dispatches_run_independently() {
    test_server::setup_may_runtime();
    let app = test_app();
    app.get("/echo/:n", |req, res| {
        let n = req.param("n").unwrap_or_default().to_string();
        may::coroutine::yield_now();
        res.send(n);
        Ok(Next::Done)
    })
    .unwrap();

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let req = Request::new(Method::GET, format!("/echo/{i}"));
            // SAFETY: handlers only touch their own request/response.
            unsafe { app.spawn(req) }.unwrap()
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let res = handle.join().unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text(), i.to_string());
    }
}

#[test]
fn test_param_cache_is_per_request() {
    test_server::setup_may_runtime();
    let app = test_app();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    app.param("id", move |_req: &mut Request, _res: &mut waypoint::Response, _v: &str, _n: &str| {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(Next::Continue)
    })
    .unwrap();
    app.get("/item/:id", |_req, res| {
        res.end();
        Ok(Next::Done)
    })
    .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let req = Request::new(Method::GET, "/item/same");
            // SAFETY: handlers only touch their own request/response.
            unsafe { app.spawn(req) }.unwrap()
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 16);
}

#[test]
fn test_registration_during_dispatch_does_not_block() {
    let app = test_app();
    app.get("/stable", |_req, res| {
        res.send("stable");
        Ok(Next::Done)
    })
    .unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let app = app.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let res = app.handle(Request::new(Method::GET, "/stable"));
                    assert_eq!(res.text(), "stable");
                }
            })
        })
        .collect();

    for i in 0..50 {
        app.get(format!("/added/{i}"), |_req, res| {
            res.end();
            Ok(Next::Done)
        })
        .unwrap();
    }
    for reader in readers {
        reader.join().unwrap();
    }
    let res = app.handle(Request::new(Method::GET, "/added/49"));
    assert_eq!(res.status(), StatusCode::OK);
}

#[test]
fn test_request_id_header_is_honored() {
    let app = test_app();
    app.get("/", |req, res| {
        res.send(req.request_id.to_string());
        Ok(Next::Done)
    })
    .unwrap();

    let id = waypoint::RequestId::new().to_string();
    let req = Request::new(Method::GET, "/").with_header(
        http::header::HeaderName::from_static("x-request-id"),
        HeaderValue::from_str(&id).unwrap(),
    );
    assert_eq!(app.handle(req).text(), id);
}
