use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use std::hint::black_box;
use waypoint::runtime_config::RuntimeConfig;
use waypoint::{Application, HandlerResult, Next, Request, Response, Router};

fn ok(label: &'static str) -> impl Fn(&mut Request, &mut Response) -> HandlerResult {
    move |_req: &mut Request, res: &mut Response| {
        res.send(label);
        Ok(Next::Done)
    }
}

fn zoo_app() -> Application {
    let app = Application::with_config(RuntimeConfig {
        env: "test".to_string(),
        ..RuntimeConfig::default()
    });
    app.use_fn("/", |_req, _res| Ok(Next::Continue)).unwrap();

    let animals = Router::new();
    animals
        .get("/", ok("get_animals"))
        .unwrap()
        .post("/", ok("create_animal"))
        .unwrap()
        .get("/:id", ok("get_animal"))
        .unwrap()
        .put("/:id", ok("update_animal"))
        .unwrap()
        .patch("/:id", ok("patch_animal"))
        .unwrap()
        .delete("/:id", ok("delete_animal"))
        .unwrap()
        .get("/:id/toys/:toy_id", ok("animal_toy"))
        .unwrap();
    app.use_router("/zoo/animals", &animals).unwrap();

    app.get(
        "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id",
        ok("habitat_section"),
    )
    .unwrap();
    app.post(
        "/inventory/:warehouse_id/feeds/:feed_id/items/:item_id/batches/:batch_id",
        ok("post_item_batch"),
    )
    .unwrap();
    app.get("/complex/:a/:b/:c/:d/:e/:f/:g/:h/:i", ok("complex_many_params"))
        .unwrap();
    app.param("id", |_req: &mut Request, _res: &mut Response, _value: &str, _name: &str| {
        Ok(Next::Continue)
    })
    .unwrap();
    app
}

fn bench_dispatch_throughput(c: &mut Criterion) {
    let app = zoo_app();
    c.bench_function("dispatch", |b| {
        let test_paths = [
            (Method::GET, "/zoo/animals/123"),
            (Method::GET, "/zoo/animals/123/toys/456"),
            (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
            (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
            (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
            (Method::GET, "/missing/route"),
        ];
        b.iter(|| {
            for (method, path) in test_paths.iter() {
                let res = app.handle(Request::new(method.clone(), *path));
                black_box(&res);
            }
        })
    });

    c.bench_function("options_allow", |b| {
        b.iter(|| {
            let res = app.handle(Request::new(Method::OPTIONS, "/zoo/animals/1"));
            black_box(&res);
        })
    });
}

criterion_group!(benches, bench_dispatch_throughput);
criterion_main!(benches);
