//! Router core: layer registration and the dispatch walk.

use arc_swap::ArcSwap;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::layer::Layer;
use super::params::ParamRegistry;
use super::route::Route;
use crate::error::{DispatchError, SetupError};
use crate::matcher::{MatchOptions, PathMatch, PathMatcher, Pattern};
use crate::middleware::{
    ErrorMiddleware, Handler, HandlerResult, Middleware, Next, ParamHook, Signal,
};
use crate::request::Request;
use crate::response::Response;

static NEXT_ROUTER_ID: AtomicU64 = AtomicU64::new(1);

/// Matching behavior shared by every layer of a router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// `/Foo` and `/foo` are different paths
    pub case_sensitive: bool,
    /// `/foo` and `/foo/` are different route paths
    pub strict: bool,
    /// Keep the parameters bound by enclosing routers visible in this one
    pub merge_params: bool,
}

/// How a walk left a router.
#[derive(Debug, Clone)]
pub enum Exit {
    /// The stack was exhausted (or `Next::SkipRouter` was returned); control
    /// goes back to the caller, carrying the pending error if any
    Next(Option<DispatchError>),
    /// A handler completed the request
    Done,
}

impl Exit {
    /// The exit as a handler result, for routers running inside another walk.
    pub fn into_result(self) -> HandlerResult {
        match self {
            Exit::Done => Ok(Next::Done),
            Exit::Next(None) => Ok(Next::Continue),
            Exit::Next(Some(err)) => Err(anyhow::Error::new(err)),
        }
    }
}

struct RouterInner {
    id: u64,
    options: RouterOptions,
    stack: ArcSwap<Vec<Layer>>,
    params: ArcSwap<ParamRegistry>,
}

/// An ordered stack of layers.
///
/// `Router` is a shared handle: clones refer to the same stack, so a router
/// mounted into another keeps receiving layers registered on it afterwards.
/// Registration appends to a copy-on-write stack and never blocks a running
/// dispatch; each dispatch walks the snapshot it started with.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("id", &self.inner.id)
            .field("options", &self.inner.options)
            .field("layers", &self.len())
            .finish()
    }
}

/// Prefix removed from `req.url` while a `use`-style layer runs.
struct Trimmed {
    removed: String,
    slash_added: bool,
}

impl Trimmed {
    /// Strip `prefix` from `req.url` and extend `base_url`.
    fn apply(req: &mut Request, prefix: &str, parent_base_url: &str) -> Option<Self> {
        if prefix.is_empty()
            || !req.url.starts_with(prefix)
            || !req.url.is_char_boundary(prefix.len())
        {
            return None;
        }

        let rest = req.url.split_off(prefix.len());
        let removed = std::mem::replace(&mut req.url, rest);
        let slash_added = !req.url.starts_with('/');
        if slash_added {
            req.url.insert(0, '/');
        }

        let segment = removed.strip_suffix('/').unwrap_or(&removed);
        req.base_url = format!("{parent_base_url}{segment}");
        Some(Self {
            removed,
            slash_added,
        })
    }

    fn restore(self, req: &mut Request, parent_base_url: &str) {
        if self.slash_added && req.url.starts_with('/') {
            req.url.remove(0);
        }
        req.url.insert_str(0, &self.removed);
        req.base_url = parent_base_url.to_string();
    }
}

impl Router {
    /// Router with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(RouterOptions::default())
    }

    #[must_use]
    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                id: NEXT_ROUTER_ID.fetch_add(1, Ordering::Relaxed),
                options,
                stack: ArcSwap::from_pointee(Vec::new()),
                params: ArcSwap::from_pointee(ParamRegistry::default()),
            }),
        }
    }

    #[must_use]
    pub fn router_options(&self) -> RouterOptions {
        self.inner.options
    }

    /// Number of layers registered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.stack.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn use_options(&self) -> MatchOptions {
        MatchOptions::prefix().sensitive(self.inner.options.case_sensitive)
    }

    fn route_options(&self) -> MatchOptions {
        MatchOptions::route()
            .sensitive(self.inner.options.case_sensitive)
            .strict(self.inner.options.strict)
    }

    fn push(&self, layers: Vec<Layer>) {
        self.inner.stack.rcu(|stack| {
            let mut next = Vec::with_capacity(stack.len() + layers.len());
            next.extend(stack.iter().cloned());
            next.extend(layers.iter().cloned());
            next
        });
    }

    /// Register `use`-style handlers under a path prefix, one layer each.
    ///
    /// # Errors
    ///
    /// [`SetupError::MissingHandler`] when `handlers` is empty,
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_handlers(
        &self,
        path: impl Into<Pattern>,
        handlers: Vec<Handler>,
    ) -> Result<&Self, SetupError> {
        if handlers.is_empty() {
            return Err(SetupError::MissingHandler("use"));
        }
        let matcher = PathMatcher::compile(path, self.use_options())?;
        debug!(
            path = %matcher.pattern(),
            handlers = handlers.len(),
            "registering middleware"
        );
        let layers = handlers
            .into_iter()
            .map(|handler| {
                let label = if handler.is_error_handler() {
                    "error"
                } else {
                    "middleware"
                };
                Layer::handler(matcher.clone(), handler, label)
            })
            .collect();
        self.push(layers);
        Ok(self)
    }

    /// Register one tagged handler under a path prefix.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_handler(
        &self,
        path: impl Into<Pattern>,
        handler: Handler,
    ) -> Result<&Self, SetupError> {
        self.use_handlers(path, vec![handler])
    }

    /// Register a middleware closure under a path prefix.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_fn<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.use_handler(path, Handler::middleware(f))
    }

    /// Register an error-handling closure under a path prefix.
    ///
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
        self.use_handler(path, Handler::error(f))
    }

    /// Register any [`Middleware`] value under a path prefix.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_middleware(
        &self,
        path: impl Into<Pattern>,
        middleware: impl Middleware + 'static,
    ) -> Result<&Self, SetupError> {
        self.use_handler(path, Handler::from_middleware(middleware))
    }

    /// Register any [`ErrorMiddleware`] value under a path prefix.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn use_error_middleware(
        &self,
        path: impl Into<Pattern>,
        middleware: impl ErrorMiddleware + 'static,
    ) -> Result<&Self, SetupError> {
        self.use_handler(path, Handler::Error(Arc::new(middleware)))
    }

    /// Mount `child` under a path prefix. Inside the child, `req.url` is
    /// relative to the prefix and `req.base_url` ends with it.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn mount(&self, path: impl Into<Pattern>, child: &Router) -> Result<&Self, SetupError> {
        let matcher = PathMatcher::compile(path, self.use_options())?;
        debug!(path = %matcher.pattern(), child = child.inner.id, "mounting router");
        self.push(vec![Layer::handler(
            matcher,
            Handler::from_middleware(child.clone()),
            "router",
        )]);
        Ok(self)
    }

    /// Create a route for `path` and append it to the stack.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn route(&self, path: impl Into<Pattern>) -> Result<Route, SetupError> {
        let matcher = PathMatcher::compile(path, self.route_options())?;
        let route = Route::new(matcher.pattern().to_string());
        debug!(path = %route.path(), "registering route");
        self.push(vec![Layer::route(matcher, route.clone())]);
        Ok(route)
    }

    /// Shorthand for `route(path)?.method(method, f)`.
    ///
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
        self.route(path)?.method(method, f);
        Ok(self)
    }

    /// Shorthand for `route(path)?.all(f)`.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn all<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.route(path)?.all(f);
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

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn head<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::HEAD, path, f)
    }

    /// # Errors
    ///
    /// [`SetupError::InvalidPattern`] when `path` does not compile.
    pub fn options<F>(&self, path: impl Into<Pattern>, f: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::OPTIONS, path, f)
    }

    /// Register a hook that runs before the handlers of any layer in this
    /// router whose path binds `name`.
    ///
    /// Hooks run in registration order, once per distinct value per request.
    /// A leading `:` is accepted and ignored.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidParamName`] for an empty name or one containing
    /// characters a path parameter cannot have.
    pub fn param<F>(&self, name: &str, hook: F) -> Result<&Self, SetupError>
    where
        F: Fn(&mut Request, &mut Response, &str, &str) -> HandlerResult + Send + Sync + 'static,
    {
        self.param_hook(name, hook)
    }

    /// Register any [`ParamHook`] value; see [`Router::param`].
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidParamName`] as for [`Router::param`].
    pub fn param_hook(
        &self,
        name: &str,
        hook: impl ParamHook + 'static,
    ) -> Result<&Self, SetupError> {
        let trimmed = name.strip_prefix(':').unwrap_or(name);
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(SetupError::InvalidParamName(name.to_string()));
        }
        let name: Arc<str> = Arc::from(trimmed);
        let hook: Arc<dyn ParamHook> = Arc::new(hook);
        debug!(param = %name, "registering param hook");
        self.inner.params.rcu(|registry| {
            let mut next = ParamRegistry::clone(registry);
            next.add(Arc::clone(&name), Arc::clone(&hook));
            next
        });
        Ok(self)
    }

    /// Walk the stack for one request.
    ///
    /// `req.base_url` and `req.params` are restored before returning, so the
    /// caller sees them as they were on entry. An `OPTIONS` request that no
    /// layer answered is answered here with the methods of every route that
    /// matched its path.
    pub fn handle(&self, req: &mut Request, res: &mut Response) -> Exit {
        let stack = self.inner.stack.load_full();
        let hooks = self.inner.params.load_full();
        let parent_base_url = req.base_url.clone();
        let parent_params = req.params.clone();
        let mut allow: Option<Vec<Method>> = (*req.method() == Method::OPTIONS).then(Vec::new);

        trace!(
            router = self.inner.id,
            method = %req.method(),
            url = %req.url,
            layers = stack.len(),
            "router dispatch"
        );

        let mut idx = 0;
        let mut pending: Option<DispatchError> = None;

        let exit = loop {
            let path = req.path().to_string();
            let mut found: Option<(&Layer, PathMatch)> = None;

            while idx < stack.len() {
                let layer = &stack[idx];
                idx += 1;

                let matched = match layer.matches(&path) {
                    Ok(Some(matched)) => matched,
                    Ok(None) => continue,
                    Err(err) => {
                        // The first decode failure wins; keep looking for an
                        // error handler.
                        if pending.is_none() {
                            pending = Some(err.into());
                        }
                        continue;
                    }
                };

                if let Some(route) = layer.as_route() {
                    if pending.is_some() {
                        continue;
                    }
                    if !route.handles_method(req.method()) {
                        if let Some(allow) = allow.as_mut() {
                            allow.extend(route.methods());
                        }
                        continue;
                    }
                } else if layer.is_error_handler() != pending.is_some() {
                    continue;
                }

                found = Some((layer, matched));
                break;
            }

            let Some((layer, PathMatch { path: prefix, params })) = found else {
                break Exit::Next(pending.take());
            };
            trace!(layer = layer.label(), path = %path, prefix = %prefix, "layer matched");

            req.params = if self.inner.options.merge_params {
                params.merged_over(&parent_params)
            } else {
                params
            };

            match hooks.process(self.inner.id, layer.keys(), req, res) {
                Signal::Continue => {}
                Signal::SkipRoute => continue,
                Signal::SkipRouter => break Exit::Next(None),
                Signal::Fail(err) => {
                    pending = Some(pending.take().unwrap_or(err));
                    continue;
                }
                Signal::Done => break Exit::Done,
            }

            let signal = if layer.as_route().is_some() {
                layer.invoke(pending.as_ref(), req, res)
            } else {
                let trimmed = Trimmed::apply(req, &prefix, &parent_base_url);
                let signal = layer.invoke(pending.as_ref(), req, res);
                if let Some(trimmed) = trimmed {
                    trimmed.restore(req, &parent_base_url);
                }
                signal
            };

            match signal {
                Signal::Continue | Signal::SkipRoute => pending = None,
                Signal::SkipRouter => break Exit::Next(None),
                Signal::Fail(err) => pending = Some(err),
                Signal::Done => break Exit::Done,
            }
        };

        req.base_url = parent_base_url;
        req.params = parent_params;

        if let (Exit::Next(None), Some(allow)) = (&exit, allow) {
            if !allow.is_empty() && !res.is_finished() {
                respond_options(res, allow);
                return Exit::Done;
            }
        }
        exit
    }
}

/// Answer an unhandled `OPTIONS` request with the methods of the matching
/// routes, each listed once in the order first seen.
fn respond_options(res: &mut Response, methods: Vec<Method>) {
    let mut distinct: Vec<&str> = Vec::with_capacity(methods.len());
    for method in &methods {
        if !distinct.contains(&method.as_str()) {
            distinct.push(method.as_str());
        }
    }
    let allow = distinct.join(",");
    debug!(allow = %allow, "answering OPTIONS");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        res.set_header(header::ALLOW, value);
    }
    res.set_header(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res.set_status(StatusCode::OK).send(allow);
}

impl Middleware for Router {
    fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        Router::handle(self, req, res).into_result()
    }
}
