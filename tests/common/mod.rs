#![allow(dead_code)]

use http::Method;
use waypoint::runtime_config::RuntimeConfig;
use waypoint::{Application, Request, Response};

pub mod test_server {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_workers(4);
        });
    }
}

pub mod tracing_util {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static TRACING_INIT: Once = Once::new();

    /// Install a test-writer subscriber honoring `RUST_LOG` (default `warn`).
    pub fn init() {
        TRACING_INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .with_test_writer()
                .try_init();
        });
    }
}

/// Application in the `test` environment with tracing installed.
pub fn test_app() -> Application {
    tracing_util::init();
    Application::with_config(RuntimeConfig {
        env: "test".to_string(),
        ..RuntimeConfig::default()
    })
}

pub fn send(app: &Application, method: Method, url: &str) -> Response {
    app.handle(Request::new(method, url))
}

pub fn get(app: &Application, url: &str) -> Response {
    send(app, Method::GET, url)
}
