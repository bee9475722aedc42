mod common;

use std::sync::{Arc, Mutex};

use common::{get, test_app};
use http::StatusCode;
use serde_json::json;
use waypoint::application::settings;
use waypoint::Next;

#[test]
fn test_mounted_app_sees_relative_url() {
    let app = test_app();
    let blog = test_app();
    blog.get("/x", |req, res| {
        res.json(&json!({
            "base_url": req.base_url,
            "url": req.url,
            "original_url": req.original_url(),
        }))?;
        Ok(Next::Done)
    })
    .unwrap();
    app.mount("/blog", &blog).unwrap();

    let res = get(&app, "/blog/x");
    let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(
        body,
        json!({"base_url": "/blog", "url": "/x", "original_url": "/blog/x"})
    );
}

#[test]
fn test_nested_mounts_accumulate_base_url() {
    let app = test_app();
    let blog = test_app();
    let admin = test_app();
    admin
        .get("/users", |req, res| {
            res.send(format!("{} {}", req.base_url, req.url));
            Ok(Next::Done)
        })
        .unwrap();
    blog.mount("/admin", &admin).unwrap();
    app.mount("/blog", &blog).unwrap();

    assert_eq!(get(&app, "/blog/admin/users").text(), "/blog/admin /users");
    assert_eq!(admin.path(), "/blog/admin");
}

#[test]
fn test_exhausted_child_resumes_parent_walk() {
    let app = test_app();
    let child = test_app();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    child
        .use_fn("/", move |req, _res| {
            s.lock().unwrap().push(req.url.clone());
            Ok(Next::Continue)
        })
        .unwrap();
    app.mount("/c", &child).unwrap();
    app.get("/c/fallback", |req, res| {
        res.send(format!("parent {}", req.url));
        Ok(Next::Done)
    })
    .unwrap();

    let res = get(&app, "/c/fallback");
    assert_eq!(res.text(), "parent /c/fallback");
    assert_eq!(*seen.lock().unwrap(), vec!["/fallback"]);
}

#[test]
fn test_child_error_is_finalized_by_root() {
    let app = test_app();
    let child = test_app();
    child
        .get("/boom", |_req, _res| {
            Err(waypoint::HttpError::new(StatusCode::CONFLICT, "already exists").into())
        })
        .unwrap();
    app.mount("/c", &child).unwrap();

    let res = get(&app, "/c/boom");
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[test]
fn test_parent_error_handler_catches_child_error() {
    let app = test_app();
    let child = test_app();
    child
        .get("/boom", |_req, _res| Err(anyhow::anyhow!("child failed")))
        .unwrap();
    app.mount("/c", &child).unwrap();
    app.use_error("/", |err, req, res| {
        res.set_status(StatusCode::BAD_GATEWAY)
            .send(format!("{} at {}", err, req.url));
        Ok(Next::Done)
    })
    .unwrap();

    let res = get(&app, "/c/boom");
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.text(), "child failed at /c/boom");
}

#[test]
fn test_child_reads_parent_settings() {
    let app = test_app();
    let child = test_app();
    app.set("title", "Waypoint Demo");
    app.mount("/c", &child).unwrap();

    let reader = child.clone();
    child
        .get("/title", move |_req, res| {
            let title = reader.setting("title").unwrap_or_default();
            res.send(title.as_str().unwrap_or_default().to_string());
            Ok(Next::Done)
        })
        .unwrap();

    assert_eq!(get(&app, "/c/title").text(), "Waypoint Demo");
    assert_eq!(child.setting(settings::ENV), Some(json!("test")));
}

#[test]
fn test_mount_event_sees_parent() {
    let app = test_app();
    app.set("name", "root");
    let child = test_app();
    let parent_name = Arc::new(Mutex::new(None));
    let p = parent_name.clone();
    child.on_mount(move |parent| {
        *p.lock().unwrap() = parent.setting("name");
    });
    app.mount("/child", &child).unwrap();
    assert_eq!(*parent_name.lock().unwrap(), Some(json!("root")));
}

#[test]
fn test_mount_at_multiple_paths() {
    let app = test_app();
    let child = test_app();
    child
        .get("/ping", |req, res| {
            res.send(req.base_url.clone());
            Ok(Next::Done)
        })
        .unwrap();
    app.mount(["/one", "/two"], &child).unwrap();

    assert_eq!(get(&app, "/one/ping").text(), "/one");
    assert_eq!(get(&app, "/two/ping").text(), "/two");
    assert_eq!(child.mountpaths(), vec!["/one", "/two"]);
}
