use http::header::{HeaderName, HeaderValue};
use http::Method;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info_span};

use super::finalhandler::finalize;
use super::settings::{self, truthy, Settings};
use crate::error::{DispatchError, SetupError};
use crate::ids::RequestId;
use crate::matcher::Pattern;
use crate::middleware::{Handler, HandlerResult, Middleware, Next, ParamHook, QueryParser};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Exit, Route, Router, RouterOptions};
use crate::runtime_config::RuntimeConfig;

type MountListener = Arc<dyn Fn(&Application) + Send + Sync>;

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

struct AppInner {
    router: OnceCell<Router>,
    settings: RwLock<Settings>,
    locals: RwLock<HashMap<String, Value>>,
    parent: RwLock<Weak<AppInner>>,
    mountpaths: RwLock<Vec<String>>,
    mount_listeners: Mutex<Vec<MountListener>>,
    config: RuntimeConfig,
}

/// An application: a root [`Router`] plus settings, locals and its place in
/// a tree of mounted applications.
///
/// `Application` is a shared handle; clones refer to the same application.
/// A parent holds its mounted children strongly through its layer stack and
/// each child points back at its parent weakly.
///
/// ```rust
/// use http::Method;
/// use waypoint::middleware::Next;
/// use waypoint::runtime_config::RuntimeConfig;
/// use waypoint::{Application, Request};
///
/// let app = Application::with_config(RuntimeConfig::default());
/// app.get("/", |_req, res| {
///     res.send("hello");
///     Ok(Next::Done)
/// })
/// .unwrap();
///
/// let res = app.handle(Request::new(Method::GET, "/"));
/// assert_eq!(res.text(), "hello");
/// assert_eq!(res.header("x-powered-by"), Some("waypoint"));
/// ```
#[derive(Clone)]
pub struct Application {
    inner: Arc<AppInner>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("mountpaths", &*self.inner.mountpaths.read())
            .field("env", &self.env())
            .finish()
    }
}

/// Built-in layer that advertises the framework when `x-powered-by` is on.
struct PoweredBy {
    app: Weak<AppInner>,
}

impl Middleware for PoweredBy {
    fn handle(&self, _req: &mut Request, res: &mut Response) -> HandlerResult {
        if let Some(inner) = self.app.upgrade() {
            if (Application { inner }).enabled(settings::X_POWERED_BY) {
                res.set_header(X_POWERED_BY, HeaderValue::from_static("waypoint"));
            }
        }
        Ok(Next::Continue)
    }
}

/// Built-in query layer, active while the `query parser` setting is truthy.
struct QueryLayer {
    app: Weak<AppInner>,
}

impl Middleware for QueryLayer {
    fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        match self.app.upgrade() {
            Some(inner) if (Application { inner: inner.clone() }).enabled(settings::QUERY_PARSER) => {
                QueryParser.handle(req, res)
            }
            _ => Ok(Next::Continue),
        }
    }
}

/// Layer that runs a mounted application's router inside the parent walk.
struct MountedApp {
    app: Application,
}

impl Middleware for MountedApp {
    fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        debug!(mountpath = %self.app.mountpath(), base_url = %req.base_url, "entering sub-application");
        self.app.router().handle(req, res).into_result()
    }
}

impl Application {
    /// Application configured from `WAYPOINT_*` environment variables.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(AppInner {
                router: OnceCell::new(),
                settings: RwLock::new(Settings::with_defaults(&config)),
                locals: RwLock::new(HashMap::new()),
                parent: RwLock::new(Weak::new()),
                mountpaths: RwLock::new(Vec::new()),
                mount_listeners: Mutex::new(Vec::new()),
                config,
            }),
        }
    }

    /// The root router, created on first use with the routing settings in
    /// effect at that moment.
    pub fn router(&self) -> &Router {
        self.inner.router.get_or_init(|| {
            let router = Router::with_options(RouterOptions {
                case_sensitive: self.enabled(settings::CASE_SENSITIVE_ROUTING),
                strict: self.enabled(settings::STRICT_ROUTING),
                merge_params: false,
            });
            let defaults = router
                .use_middleware(
                    "/",
                    QueryLayer {
                        app: Arc::downgrade(&self.inner),
                    },
                )
                .and_then(|r| {
                    r.use_middleware(
                        "/",
                        PoweredBy {
                            app: Arc::downgrade(&self.inner),
                        },
                    )
                });
            if let Err(err) = defaults {
                tracing::error!(error = %err, "failed to install default middleware");
            }
            router
        })
    }

    // ---- settings -------------------------------------------------------

    /// Set a setting on this application.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> &Self {
        let value = value.into();
        debug!(setting = name, value = %value, "set");
        self.inner.settings.write().set(name, value);
        self
    }

    /// Look up a setting: this application, then its ancestors, then the
    /// inheritable defaults.
    #[must_use]
    pub fn setting(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.inner.settings.read().local(name) {
            return Some(value.clone());
        }
        if let Some(parent) = self.parent() {
            if let Some(value) = parent.setting(name) {
                return Some(value);
            }
        }
        self.inner.settings.read().fallback(name).cloned()
    }

    pub fn enable(&self, name: &str) -> &Self {
        self.set(name, true)
    }

    pub fn disable(&self, name: &str) -> &Self {
        self.set(name, false)
    }

    #[must_use]
    pub fn enabled(&self, name: &str) -> bool {
        self.setting(name).is_some_and(|v| truthy(&v))
    }

    #[must_use]
    pub fn disabled(&self, name: &str) -> bool {
        !self.enabled(name)
    }

    /// The `env` setting (`development` unless configured otherwise).
    #[must_use]
    pub fn env(&self) -> String {
        match self.setting(settings::ENV) {
            Some(Value::String(env)) => env,
            _ => self.inner.config.env.clone(),
        }
    }

    /// Store an application-level value visible to handlers holding the app.
    pub fn set_local(&self, name: &str, value: impl Into<Value>) -> &Self {
        self.inner.locals.write().insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn local(&self, name: &str) -> Option<Value> {
        self.inner.locals.read().get(name).cloned()
    }

    // ---- mount tree -----------------------------------------------------

    /// The application this one was most recently mounted into.
    #[must_use]
    pub fn parent(&self) -> Option<Application> {
        self.inner
            .parent
            .read()
            .upgrade()
            .map(|inner| Application { inner })
    }

    /// First path this application was mounted at, `/` when unmounted.
    #[must_use]
    pub fn mountpath(&self) -> String {
        self.inner
            .mountpaths
            .read()
            .first()
            .cloned()
            .unwrap_or_else(|| "/".to_string())
    }

    /// Every path this application has been mounted at, empty when unmounted.
    #[must_use]
    pub fn mountpaths(&self) -> Vec<String> {
        self.inner.mountpaths.read().clone()
    }

    /// Absolute path of this application: the first mountpath of each
    /// ancestor level joined together, the root contributing `""`.
    #[must_use]
    pub fn path(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{}{}", parent.path(), self.mountpath()),
            None => String::new(),
        }
    }

    /// Register a listener called with the parent each time this application
    /// is mounted.
    pub fn on_mount(&self, listener: impl Fn(&Application) + Send + Sync + 'static) -> &Self {
        self.inner.mount_listeners.lock().push(Arc::new(listener));
        self
    }

    /// Mount `child` under `path`.
    ///
    /// Requests under the prefix run through the child's stack with `url`
    /// relative to it; when the child's walk is exhausted the parent's walk
    /// resumes. The child inherits this application's settings for keys it
    /// does not set itself.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn mount(&self, path: impl Into<Pattern>, child: &Application) -> Result<&Self, SetupError> {
        let pattern = path.into();
        let paths: Vec<String> = match &pattern {
            Pattern::List(items) => items.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        };

        self.router().use_middleware(
            pattern,
            MountedApp {
                app: child.clone(),
            },
        )?;

        *child.inner.parent.write() = Arc::downgrade(&self.inner);
        child.inner.mountpaths.write().extend(paths);
        debug!(mountpath = %child.mountpath(), parent = %self.path(), "mounted sub-application");

        let listeners = child.inner.mount_listeners.lock().clone();
        for listener in &listeners {
            listener(self);
        }
        Ok(self)
    }

    // ---- registration ---------------------------------------------------

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_fn<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.router().use_fn(path, f)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_error<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&DispatchError, &mut Request, &mut Response) -> HandlerResult
            + Send
            + Sync
            + 'static,
    {
        self.router().use_error(path, f)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`SetupError::MissingHandler`] for an empty list,
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_handlers(
        &self,
        path: impl Into<Pattern>,
        handlers: Vec<Handler>,
    ) -> Result<&Self, SetupError> {
        self.router().use_handlers(path, handlers)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_middleware(
        &self,
        path: impl Into<Pattern>,
        middleware: impl Middleware + 'static,
    ) -> Result<&Self, SetupError> {
        self.router().use_middleware(path, middleware)?;
        Ok(self)
    }

    /// Mount a plain router.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_router(&self, path: impl Into<Pattern>, router: &Router) -> Result<&Self, SetupError> {
        self.router().mount(path, router)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn route(&self, path: impl Into<Pattern>) -> Result<Route, SetupError> {
        self.router().route(path)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidParamName`] for an unusable parameter name.
    pub fn param<F>(&self, name: &str, hook: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response, &str, &str) -> HandlerResult + Send + Sync + 'static,
    {
        self.router().param(name, hook)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidParamName`] for an unusable parameter name.
    pub fn param_hook(&self, name: &str, hook: impl ParamHook + 'static) -> Result<&Self, SetupError> {
        self.router().param_hook(name, hook)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn method<F>(
        &self,
        method: Method,
        path: impl Into<Pattern>,
        f: F,
    ) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.router().method(method, path, f)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn all<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.router().all(path, f)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn get<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::GET, path, f)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn post<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::POST, path, f)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn put<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::PUT, path, f)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn delete<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::DELETE, path, f)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn patch<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::PATCH, path, f)
    }

    // ---- dispatch -------------------------------------------------------

    /// Dispatch `req` and return the finished response.
    pub fn handle(&self, mut req: Request) -> Response {
        let mut res = Response::for_request(&req);
        self.dispatch(&mut req, &mut res);
        res
    }

    /// Dispatch into caller-owned request and response values.
    ///
    /// Falls back to the terminal handler (404 or error document) when the
    /// root walk is exhausted.
    pub fn dispatch(&self, req: &mut Request, res: &mut Response) {
        req.request_id = RequestId::from_headers(&req.headers);
        let span = info_span!(
            "dispatch",
            request_id = %req.request_id,
            method = %req.method(),
            url = %req.url,
        );
        let _entered = span.enter();

        match self.router().handle(req, res) {
            Exit::Done => {}
            Exit::Next(err) => finalize(err.as_ref(), &self.env(), req, res),
        }
        debug!(status = res.status().as_u16(), "dispatch complete");
    }

    /// Dispatch `req` on a new `may` coroutine with the configured stack size.
    ///
    /// # Safety
    ///
    /// This function is marked unsafe because it calls `may::coroutine::Builder::spawn()`,
    /// which is unsafe in the `may` runtime. The caller must ensure handlers do not
    /// rely on thread-local state that a coroutine migrating between worker threads
    /// would break.
    ///
    /// # Errors
    ///
    /// Returns the I/O error reported when the coroutine cannot be created.
    pub unsafe fn spawn(&self, req: Request) -> std::io::Result<may::coroutine::JoinHandle<Response>> {
        let app = self.clone();
        let stack_size = self.inner.config.stack_size;
        debug!(stack_size, method = %req.method(), url = %req.url, "spawning dispatch coroutine");
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns everything it touches (`Send + 'static`) and the walk
        // catches handler panics, so no unwinding crosses the coroutine boundary.
        unsafe {
            may::coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || app.handle(req))
        }
    }
}
